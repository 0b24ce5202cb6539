use crate::env::Environment;
use crate::rite::{Altar, RiteFactory};
use crate::value::Value;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::io::Write;
use tracing::{debug, trace};

/// Factory allows creating instances of ExecutableRite.
///
/// Only supports rites defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// What a line produced, when it produced anything.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// A formatted message.
    Text(String),
    /// The evaluated value itself, as returned by `chant`.
    Value(Value),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Text(s) => f.write_str(s),
            Response::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Line interpreter for the ritual language.
///
/// The interpreter owns the variable [`Environment`] of one session, the sink
/// that `chant` and `whisper` speak into, and the random source used by
/// `whisper` and `ritual`.
///
/// Example
/// ```
/// use cthulhu_rites::{Interpreter, Response};
/// let mut interp = Interpreter::with_seed(7);
/// let res = interp.run_line("summon x = 5").unwrap();
/// assert_eq!(res, Some(Response::Text("x awakened as 5".to_string())));
/// assert_eq!(interp.run_line("# a comment").unwrap(), None);
/// ```
pub struct Interpreter {
    env: Environment,
    out: Box<dyn Write>,
    rng: StdRng,
    rites: Vec<Box<dyn RiteFactory>>,
}

impl Interpreter {
    /// Create an interpreter speaking into `out` and drawing randomness from `rng`.
    pub fn new(out: Box<dyn Write>, rng: StdRng) -> Self {
        use crate::rite::*;
        Self {
            env: Environment::new(),
            out,
            rng,
            // first match wins
            rites: vec![
                Box::new(Factory::<Summon>::default()),
                Box::new(Factory::<Chant>::default()),
                Box::new(Factory::<Fuse>::default()),
                Box::new(Factory::<Banish>::default()),
                Box::new(Factory::<Whisper>::default()),
                Box::new(Factory::<Dream>::default()),
                Box::new(Factory::<Madness>::default()),
                Box::new(Factory::<Ritual>::default()),
                Box::new(Factory::<Help>::default()),
            ],
        }
    }

    /// Create an interpreter on standard output with a reproducible random source.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(Box::new(std::io::stdout()), StdRng::seed_from_u64(seed))
    }

    /// Variables summoned so far.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Process a single line.
    ///
    /// Returns `Ok(None)` for blank lines, comments and malformed-but-recognized
    /// rites. Unknown lines are answered, not rejected. The only error is a
    /// failure to write to the output sink.
    pub fn run_line(&mut self, line: &str) -> Result<Option<Response>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        trace!(line, "running line");

        for factory in &self.rites {
            if let Some(rite) = factory.try_create(line) {
                debug!(verb = factory.verb(), "rite recognized");
                let mut altar = Altar {
                    env: &mut self.env,
                    out: &mut *self.out,
                    rng: &mut self.rng,
                };
                return rite.perform(&mut altar);
            }
        }

        debug!(line, "no rite recognized");
        Ok(Some(Response::Text(format!(
            "The Old Ones do not understand: {}",
            line
        ))))
    }
}

impl Default for Interpreter {
    /// Interpreter on standard output with an entropy-seeded random source.
    fn default() -> Self {
        Self::new(Box::new(std::io::stdout()), StdRng::from_entropy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::MemWriter;
    use pretty_assertions::assert_eq;

    fn interp_with_capture() -> (Interpreter, MemWriter) {
        let sink = MemWriter::new();
        let interp = Interpreter::new(Box::new(sink.clone()), StdRng::seed_from_u64(42));
        (interp, sink)
    }

    fn run(interp: &mut Interpreter, line: &str) -> Option<String> {
        interp.run_line(line).unwrap().map(|r| r.to_string())
    }

    #[test]
    fn test_blank_and_comment_lines_are_silent() {
        let (mut interp, sink) = interp_with_capture();
        assert_eq!(run(&mut interp, ""), None);
        assert_eq!(run(&mut interp, "   \t "), None);
        assert_eq!(run(&mut interp, "# summon x = 1"), None);
        assert_eq!(run(&mut interp, "   # indented"), None);
        assert!(interp.env().is_empty());
        assert_eq!(sink.contents(), "");
    }

    #[test]
    fn test_summon_then_chant() {
        let (mut interp, sink) = interp_with_capture();
        assert_eq!(run(&mut interp, "summon x = 5"), Some("x awakened as 5".to_string()));
        assert_eq!(
            interp.run_line("chant x").unwrap(),
            Some(Response::Value(Value::from(5)))
        );
        assert_eq!(sink.contents(), "5\n");
    }

    #[test]
    fn test_unknown_line_gets_catch_all() {
        let (mut interp, _) = interp_with_capture();
        assert_eq!(
            run(&mut interp, "  foobar  "),
            Some("The Old Ones do not understand: foobar".to_string())
        );
    }

    #[test]
    fn test_malformed_summon_reaches_catch_all() {
        let (mut interp, _) = interp_with_capture();
        assert_eq!(
            run(&mut interp, "summon x"),
            Some("The Old Ones do not understand: summon x".to_string())
        );
    }

    #[test]
    fn test_wrong_argument_count_is_silent() {
        let (mut interp, _) = interp_with_capture();
        assert_eq!(run(&mut interp, "fuse 1"), None);
        assert_eq!(run(&mut interp, "banish"), None);
        assert_eq!(run(&mut interp, "banish a b"), None);
        assert_eq!(run(&mut interp, "ritual 1 2 3"), None);
    }

    #[test]
    fn test_madness_after_summons() {
        let (mut interp, _) = interp_with_capture();
        assert_eq!(
            run(&mut interp, "madness"),
            Some("Madness reveals... nothing.".to_string())
        );
        run(&mut interp, "summon a = 1");
        run(&mut interp, "summon b = 2");
        assert_eq!(
            run(&mut interp, "madness"),
            Some("Madness reveals: a=1, b=2".to_string())
        );
    }

    #[test]
    fn test_same_seed_same_scrambles() {
        let (mut first, _) = interp_with_capture();
        let (mut second, _) = interp_with_capture();
        for line in ["whisper 'the stars are right'", "ritual ia cthulhu", "ritual 6 7"] {
            assert_eq!(run(&mut first, line), run(&mut second, line));
        }
    }
}
