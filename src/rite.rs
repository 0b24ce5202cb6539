use crate::env::Environment;
use crate::evaluator::eval;
use crate::interpreter::{Factory, Response};
use crate::value::Value;
use anyhow::Result;
use num_bigint::BigInt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::io::Write;
use std::sync::LazyLock;

static SUMMON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^summon\s+(\w+)\s*=\s*(.+)").expect("summon pattern is valid")
});

pub(crate) const HELP_TEXT: &str = "📜 *The Expanded Cthulhu Scrolls* 📜\n\
summon <name> = <expr>   → awaken a variable\n\
chant <expr>             → speak its value aloud\n\
fuse <a> <b>             → merge two horrors into one\n\
banish <name>            → forget a variable\n\
whisper <expr>           → speak scrambled secrets\n\
dream <expr>             → distort a value in dream logic\n\
madness                  → list all known variables\n\
ritual <a> <b>           → perform a strange binding\n\
help                     → show this scroll\n\
quit / exit              → escape the abyss\n";

/// Everything a rite may touch while it runs.
pub(crate) struct Altar<'a> {
    pub env: &'a mut Environment,
    pub out: &'a mut dyn Write,
    pub rng: &'a mut StdRng,
}

/// How a rite sees a line.
pub(crate) enum Recognition<T> {
    /// The line is this rite, with well-formed arguments.
    Accepted(T),
    /// The line starts with this rite's verb but has the wrong number of arguments.
    /// Such lines are swallowed without output.
    Malformed,
    /// Not this rite; the next one gets a chance.
    Declined,
}

impl<T> Recognition<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Recognition<U> {
        match self {
            Recognition::Accepted(t) => Recognition::Accepted(f(t)),
            Recognition::Malformed => Recognition::Malformed,
            Recognition::Declined => Recognition::Declined,
        }
    }
}

/// Rites known to the interpreter at compile time.
pub(crate) trait BuiltinRite: Sized {
    /// Verb naming the rite, e.g. "summon".
    fn verb() -> &'static str;

    /// Decide whether the trimmed `line` invokes this rite.
    fn recognize(line: &str) -> Recognition<Self>;

    fn perform(self, altar: &mut Altar<'_>) -> Result<Option<Response>>;
}

/// Object-safe form of a recognized rite, ready to run.
pub(crate) trait ExecutableRite {
    fn perform(self: Box<Self>, altar: &mut Altar<'_>) -> Result<Option<Response>>;
}

impl<T: BuiltinRite> ExecutableRite for T {
    fn perform(self: Box<Self>, altar: &mut Altar<'_>) -> Result<Option<Response>> {
        <T as BuiltinRite>::perform(*self, altar)
    }
}

/// Factory that tries to recognize a rite in a line.
///
/// Returns `None` when the line is not for this rite.
pub(crate) trait RiteFactory {
    fn verb(&self) -> &'static str;

    fn try_create(&self, line: &str) -> Option<Box<dyn ExecutableRite>>;
}

/// A prefix-matching line whose arguments do not fit; produces nothing.
struct Silence;

impl ExecutableRite for Silence {
    fn perform(self: Box<Self>, _altar: &mut Altar<'_>) -> Result<Option<Response>> {
        Ok(None)
    }
}

impl<T: BuiltinRite + 'static> RiteFactory for Factory<T> {
    fn verb(&self) -> &'static str {
        T::verb()
    }

    fn try_create(&self, line: &str) -> Option<Box<dyn ExecutableRite>> {
        match T::recognize(line) {
            Recognition::Accepted(rite) => Some(Box::new(rite)),
            Recognition::Malformed => Some(Box::new(Silence)),
            Recognition::Declined => None,
        }
    }
}

/// Text following `verb`, trimmed.
fn rest_after<'a>(line: &'a str, verb: &str) -> Option<&'a str> {
    line.strip_prefix(verb).map(str::trim)
}

/// Whitespace-separated arguments after the verb, when there are exactly `N`.
fn exact_args<const N: usize>(line: &str, verb: &str) -> Recognition<[String; N]> {
    if !line.starts_with(verb) {
        return Recognition::Declined;
    }
    let parts: Vec<String> = line.split_whitespace().skip(1).map(String::from).collect();
    match <[String; N]>::try_from(parts) {
        Ok(args) => Recognition::Accepted(args),
        Err(_) => Recognition::Malformed,
    }
}

fn scramble(text: &str, rng: &mut StdRng) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    chars.shuffle(rng);
    chars.into_iter().collect()
}

/// Bind a value to a name: `summon NAME = EXPR`.
pub struct Summon {
    pub name: String,
    pub expr: String,
}

impl BuiltinRite for Summon {
    fn verb() -> &'static str {
        "summon"
    }

    fn recognize(line: &str) -> Recognition<Self> {
        match SUMMON_RE.captures(line) {
            Some(caps) => Recognition::Accepted(Summon {
                name: caps[1].to_string(),
                expr: caps[2].to_string(),
            }),
            // a summon without `NAME = EXPR` is not a summon at all
            None => Recognition::Declined,
        }
    }

    fn perform(self, altar: &mut Altar<'_>) -> Result<Option<Response>> {
        let value = eval(&self.expr, altar.env);
        let message = format!("{} awakened as {}", self.name, value);
        altar.env.set_var(self.name, value);
        Ok(Some(Response::Text(message)))
    }
}

/// Speak a value aloud: `chant EXPR`.
pub struct Chant {
    pub expr: String,
}

impl BuiltinRite for Chant {
    fn verb() -> &'static str {
        "chant"
    }

    fn recognize(line: &str) -> Recognition<Self> {
        match rest_after(line, Self::verb()) {
            Some(expr) => Recognition::Accepted(Chant {
                expr: expr.to_string(),
            }),
            None => Recognition::Declined,
        }
    }

    fn perform(self, altar: &mut Altar<'_>) -> Result<Option<Response>> {
        let value = eval(&self.expr, altar.env);
        writeln!(altar.out, "{}", value)?;
        Ok(Some(Response::Value(value)))
    }
}

/// Glue the displayed forms of two values together: `fuse A B`.
pub struct Fuse {
    pub args: [String; 2],
}

impl BuiltinRite for Fuse {
    fn verb() -> &'static str {
        "fuse"
    }

    fn recognize(line: &str) -> Recognition<Self> {
        exact_args::<2>(line, Self::verb()).map(|args| Fuse { args })
    }

    fn perform(self, altar: &mut Altar<'_>) -> Result<Option<Response>> {
        let [a, b] = self.args;
        let va = eval(&a, altar.env);
        let vb = eval(&b, altar.env);
        Ok(Some(Response::Text(format!("The fusion is {}{}", va, vb))))
    }
}

/// Forget a variable: `banish NAME`.
pub struct Banish {
    pub name: String,
}

impl BuiltinRite for Banish {
    fn verb() -> &'static str {
        "banish"
    }

    fn recognize(line: &str) -> Recognition<Self> {
        exact_args::<1>(line, Self::verb()).map(|[name]| Banish { name })
    }

    fn perform(self, altar: &mut Altar<'_>) -> Result<Option<Response>> {
        let message = match altar.env.remove_var(&self.name) {
            Some(_) => format!("{} has been banished to the void", self.name),
            None => format!("{} was never summoned", self.name),
        };
        Ok(Some(Response::Text(message)))
    }
}

/// Speak a value with its characters shuffled: `whisper EXPR`.
pub struct Whisper {
    pub expr: String,
}

impl BuiltinRite for Whisper {
    fn verb() -> &'static str {
        "whisper"
    }

    fn recognize(line: &str) -> Recognition<Self> {
        match rest_after(line, Self::verb()) {
            Some(expr) => Recognition::Accepted(Whisper {
                expr: expr.to_string(),
            }),
            None => Recognition::Declined,
        }
    }

    fn perform(self, altar: &mut Altar<'_>) -> Result<Option<Response>> {
        let secret = eval(&self.expr, altar.env).to_string();
        let scrambled = scramble(&secret, altar.rng);
        writeln!(altar.out, "(whisper) {}", scrambled)?;
        Ok(Some(Response::Text(scrambled)))
    }
}

/// Distort a value in dream logic: `dream EXPR`.
pub struct Dream {
    pub expr: String,
}

impl BuiltinRite for Dream {
    fn verb() -> &'static str {
        "dream"
    }

    fn recognize(line: &str) -> Recognition<Self> {
        match rest_after(line, Self::verb()) {
            Some(expr) => Recognition::Accepted(Dream {
                expr: expr.to_string(),
            }),
            None => Recognition::Declined,
        }
    }

    fn perform(self, altar: &mut Altar<'_>) -> Result<Option<Response>> {
        let message = match eval(&self.expr, altar.env) {
            Value::Int(n) => {
                format!("In dream, {} becomes {} or maybe {}", n, &n * &n, &n * BigInt::from(13))
            }
            Value::Str(s) => {
                let reversed: String = s.chars().rev().collect();
                format!("In dream, '{}' is written backwards as '{}'", s, reversed)
            }
            other => format!("The dream distorts {}", other),
        };
        Ok(Some(Response::Text(message)))
    }
}

/// List every variable: `madness`.
pub struct Madness;

impl BuiltinRite for Madness {
    fn verb() -> &'static str {
        "madness"
    }

    fn recognize(line: &str) -> Recognition<Self> {
        if line == Self::verb() {
            Recognition::Accepted(Madness)
        } else {
            Recognition::Declined
        }
    }

    fn perform(self, altar: &mut Altar<'_>) -> Result<Option<Response>> {
        if altar.env.is_empty() {
            return Ok(Some(Response::Text("Madness reveals... nothing.".to_string())));
        }
        let listing = altar
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Some(Response::Text(format!("Madness reveals: {}", listing))))
    }
}

/// Bind two values: multiply integers with a random twist, scramble anything else.
pub struct Ritual {
    pub args: [String; 2],
}

impl BuiltinRite for Ritual {
    fn verb() -> &'static str {
        "ritual"
    }

    fn recognize(line: &str) -> Recognition<Self> {
        exact_args::<2>(line, Self::verb()).map(|args| Ritual { args })
    }

    fn perform(self, altar: &mut Altar<'_>) -> Result<Option<Response>> {
        let [a, b] = self.args;
        let va = eval(&a, altar.env);
        let vb = eval(&b, altar.env);
        let message = match (va.as_int(), vb.as_int()) {
            (Some(x), Some(y)) => {
                let offset: i32 = altar.rng.gen_range(-5..=5);
                let bound = x * y + BigInt::from(offset);
                format!("Ritual binds them: {}", bound)
            }
            _ => {
                let joined = format!("{}{}", va, vb);
                format!("Ritual scrambles them into: {}", scramble(&joined, altar.rng))
            }
        };
        Ok(Some(Response::Text(message)))
    }
}

/// Show the help scroll: `help`, in any letter case.
pub struct Help;

impl BuiltinRite for Help {
    fn verb() -> &'static str {
        "help"
    }

    fn recognize(line: &str) -> Recognition<Self> {
        if line.to_lowercase() == Self::verb() {
            Recognition::Accepted(Help)
        } else {
            Recognition::Declined
        }
    }

    fn perform(self, _altar: &mut Altar<'_>) -> Result<Option<Response>> {
        Ok(Some(Response::Text(HELP_TEXT.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    struct TestAltar {
        env: Environment,
        out: Vec<u8>,
        rng: StdRng,
    }

    impl TestAltar {
        fn new() -> Self {
            Self {
                env: Environment::new(),
                out: Vec::new(),
                rng: StdRng::seed_from_u64(13),
            }
        }

        fn perform<T: BuiltinRite>(&mut self, rite: T) -> Option<Response> {
            let mut altar = Altar {
                env: &mut self.env,
                out: &mut self.out,
                rng: &mut self.rng,
            };
            rite.perform(&mut altar).unwrap()
        }

        fn printed(&self) -> String {
            String::from_utf8(self.out.clone()).unwrap()
        }
    }

    fn text(s: &str) -> Option<Response> {
        Some(Response::Text(s.to_string()))
    }

    fn sorted_chars(s: &str) -> Vec<char> {
        let mut chars: Vec<char> = s.chars().collect();
        chars.sort_unstable();
        chars
    }

    #[test]
    fn test_summon_recognition() {
        match Summon::recognize("summon  foo_1 =  2 + 3") {
            Recognition::Accepted(s) => {
                assert_eq!(s.name, "foo_1");
                assert_eq!(s.expr, "2 + 3");
            }
            _ => panic!("expected summon to be accepted"),
        }
        assert!(matches!(Summon::recognize("summon x"), Recognition::Declined));
        assert!(matches!(Summon::recognize("summon x ="), Recognition::Declined));
        assert!(matches!(Summon::recognize("summonx = 1"), Recognition::Declined));
    }

    #[test]
    fn test_summon_stores_and_overwrites() {
        let mut t = TestAltar::new();
        let res = t.perform(Summon {
            name: "x".to_string(),
            expr: "5".to_string(),
        });
        assert_eq!(res, text("x awakened as 5"));

        let res = t.perform(Summon {
            name: "x".to_string(),
            expr: "x * 2".to_string(),
        });
        assert_eq!(res, text("x awakened as 10"));
        assert_eq!(t.env.get_var("x"), Some(&Value::from(10)));
    }

    #[test]
    fn test_chant_prints_and_returns_value() {
        let mut t = TestAltar::new();
        t.env.set_var("x", Value::from(5));
        let res = t.perform(Chant {
            expr: "x".to_string(),
        });
        assert_eq!(res, Some(Response::Value(Value::from(5))));
        assert_eq!(t.printed(), "5\n");
    }

    #[test]
    fn test_verbs_match_by_prefix() {
        match Chant::recognize("chanting") {
            Recognition::Accepted(c) => assert_eq!(c.expr, "ing"),
            _ => panic!("chant is a prefix match"),
        }
        assert!(matches!(Chant::recognize("chan x"), Recognition::Declined));
        assert!(matches!(Fuse::recognize("fuses a b"), Recognition::Accepted(_)));
    }

    #[test]
    fn test_argument_count_is_checked() {
        assert!(matches!(Fuse::recognize("fuse 1"), Recognition::Malformed));
        assert!(matches!(Fuse::recognize("fuse 1 2 3"), Recognition::Malformed));
        assert!(matches!(Banish::recognize("banish"), Recognition::Malformed));
        assert!(matches!(Banish::recognize("banish a b"), Recognition::Malformed));
        assert!(matches!(Ritual::recognize("ritual 3"), Recognition::Malformed));
        assert!(matches!(Ritual::recognize("dance 3 4"), Recognition::Declined));
    }

    #[test]
    fn test_fuse_concatenates_displays() {
        let mut t = TestAltar::new();
        t.env.set_var("a", Value::from("dark"));
        let res = t.perform(Fuse {
            args: ["1".to_string(), "2".to_string()],
        });
        assert_eq!(res, text("The fusion is 12"));

        let res = t.perform(Fuse {
            args: ["a".to_string(), "1/2".to_string()],
        });
        assert_eq!(res, text("The fusion is dark0.5"));
    }

    #[test]
    fn test_banish_twice() {
        let mut t = TestAltar::new();
        t.env.set_var("x", Value::from(5));
        let banish = || Banish {
            name: "x".to_string(),
        };
        assert_eq!(t.perform(banish()), text("x has been banished to the void"));
        assert_eq!(t.perform(banish()), text("x was never summoned"));
        assert!(t.env.is_empty());
    }

    #[test]
    fn test_whisper_is_a_permutation() {
        let mut t = TestAltar::new();
        let res = t.perform(Whisper {
            expr: "'necronomicon' * 2".to_string(),
        });
        let Some(Response::Text(scrambled)) = res else {
            panic!("whisper returns text");
        };
        assert_eq!(sorted_chars(&scrambled), sorted_chars("necronomiconnecronomicon"));
        assert_eq!(t.printed(), format!("(whisper) {}\n", scrambled));
    }

    #[test]
    fn test_dream_by_kind() {
        let mut t = TestAltar::new();
        let dream = |expr: &str| Dream {
            expr: expr.to_string(),
        };
        assert_eq!(t.perform(dream("4")), text("In dream, 4 becomes 16 or maybe 52"));
        assert_eq!(
            t.perform(dream("hello")),
            text("In dream, 'hello' is written backwards as 'olleh'")
        );
        assert_eq!(t.perform(dream("2.5")), text("The dream distorts 2.5"));
        assert_eq!(
            t.perform(dream("9223372036854775807")),
            text(
                "In dream, 9223372036854775807 becomes \
                 85070591730234615847396907784232501249 or maybe 119903836479112085491"
            )
        );
        assert_eq!(
            t.perform(dream("3000000000 * 4000000000")),
            text(
                "In dream, 12000000000000000000 becomes \
                 144000000000000000000000000000000000000 or maybe 156000000000000000000"
            )
        );
    }

    #[test]
    fn test_madness_lists_in_order() {
        let mut t = TestAltar::new();
        assert_eq!(t.perform(Madness), text("Madness reveals... nothing."));
        t.env.set_var("a", Value::from(1));
        t.env.set_var("b", Value::from("two"));
        assert_eq!(t.perform(Madness), text("Madness reveals: a=1, b=two"));
        assert!(matches!(Madness::recognize("madness now"), Recognition::Declined));
    }

    #[test]
    fn test_ritual_binds_integers_within_offset() {
        let mut t = TestAltar::new();
        for _ in 0..200 {
            let res = t.perform(Ritual {
                args: ["3".to_string(), "4".to_string()],
            });
            let Some(Response::Text(msg)) = res else {
                panic!("ritual returns text");
            };
            let n: i64 = msg
                .strip_prefix("Ritual binds them: ")
                .unwrap()
                .parse()
                .unwrap();
            assert!((7..=17).contains(&n), "{} out of range", n);
        }
    }

    #[test]
    fn test_ritual_scrambles_non_integers() {
        let mut t = TestAltar::new();
        let res = t.perform(Ritual {
            args: ["abc".to_string(), "1.5".to_string()],
        });
        let Some(Response::Text(msg)) = res else {
            panic!("ritual returns text");
        };
        let scrambled = msg.strip_prefix("Ritual scrambles them into: ").unwrap();
        assert_eq!(sorted_chars(scrambled), sorted_chars("abc1.5"));
    }

    #[test]
    fn test_help_is_case_insensitive() {
        assert!(matches!(Help::recognize("HeLp"), Recognition::Accepted(_)));
        assert!(matches!(Help::recognize("help me"), Recognition::Declined));
    }

    #[test]
    fn test_help_scroll_text() {
        let expected = [
            "📜 *The Expanded Cthulhu Scrolls* 📜",
            "summon <name> = <expr>   → awaken a variable",
            "chant <expr>             → speak its value aloud",
            "fuse <a> <b>             → merge two horrors into one",
            "banish <name>            → forget a variable",
            "whisper <expr>           → speak scrambled secrets",
            "dream <expr>             → distort a value in dream logic",
            "madness                  → list all known variables",
            "ritual <a> <b>           → perform a strange binding",
            "help                     → show this scroll",
            "quit / exit              → escape the abyss",
            "",
        ]
        .join("\n");
        assert_eq!(HELP_TEXT, expected);

        let mut t = TestAltar::new();
        assert_eq!(t.perform(Help), text(&expected));
    }
}
