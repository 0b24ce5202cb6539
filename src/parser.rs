use crate::lexer::Token;
use num_bigint::BigInt;
use thiserror::Error;

/// Binary operators of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// True division, `/`.
    Div,
    /// Floor division, `//`.
    FloorDiv,
    Mod,
    Pow,
}

/// AST node of an expression fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(BigInt),
    Float(f64),
    Str(String),
    /// A variable reference, resolved against the environment at evaluation time.
    Var(String),
    /// Unary minus.
    Neg(Box<Expr>),
    /// Unary plus.
    Pos(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Errors that can occur during the AST construction (parsing) phase.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParsingError {
    /// Encountered a token that was not expected at the current position according to the grammar.
    #[error("unexpected token {0:?}")]
    UnexpectedToken(Token),
    /// Reached the end of the token stream prematurely.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
}

struct AstBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl AstBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        AstBuilder { tokens, pos: 0 }
    }

    fn build_ast(mut self) -> Result<Expr, ParsingError> {
        let ast = self.parse_expr()?;

        // Ensure we consumed all tokens
        if let Some(token) = self.consume() {
            return Err(ParsingError::UnexpectedToken(token));
        }

        Ok(ast)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParsingError> {
        match self.consume() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(ParsingError::UnexpectedToken(token)),
            None => Err(ParsingError::UnexpectedEnd),
        }
    }

    /// expr := term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Expr, ParsingError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.consume();
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    /// term := unary (('*' | '/' | '//' | '%') unary)*
    fn parse_term(&mut self) -> Result<Expr, ParsingError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::DoubleSlash) => BinOp::FloorDiv,
                Some(Token::Percent) => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.consume();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    /// unary := ('-' | '+') unary | power
    fn parse_unary(&mut self) -> Result<Expr, ParsingError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Plus) => {
                self.consume();
                Ok(Expr::Pos(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_power(),
        }
    }

    /// power := atom ('**' unary)?
    ///
    /// The exponent is parsed as a unary so `2 ** -1` works and `2 ** 3 ** 2`
    /// groups to the right.
    fn parse_power(&mut self) -> Result<Expr, ParsingError> {
        let base = self.parse_atom()?;
        if let Some(Token::DoubleStar) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    /// atom := INT | FLOAT | STRING+ | IDENT | '(' expr ')'
    fn parse_atom(&mut self) -> Result<Expr, ParsingError> {
        match self.consume() {
            Some(Token::Int(n)) => Ok(Expr::Int(n)),
            Some(Token::Float(x)) => Ok(Expr::Float(x)),
            Some(Token::Str(mut s)) => {
                // adjacent string literals are glued together
                while let Some(Token::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Str(s))
            }
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(token) => Err(ParsingError::UnexpectedToken(token)),
            None => Err(ParsingError::UnexpectedEnd),
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

/// Build an expression tree from tokens, requiring every token to be consumed.
pub fn construct_ast(tokens: Vec<Token>) -> Result<Expr, ParsingError> {
    AstBuilder::from(tokens).build_ast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;

    fn parse(s: &str) -> Result<Expr, ParsingError> {
        construct_ast(split_into_tokens(s).unwrap())
    }

    fn int(n: i64) -> Box<Expr> {
        Box::new(Expr::Int(BigInt::from(n)))
    }

    #[test]
    fn test_mul_binds_tighter_than_add() {
        assert_eq!(
            parse("1 + 2 * 3").unwrap(),
            Expr::Binary {
                op: BinOp::Add,
                lhs: int(1),
                rhs: Box::new(Expr::Binary {
                    op: BinOp::Mul,
                    lhs: int(2),
                    rhs: int(3),
                }),
            }
        );
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        assert_eq!(
            parse("8 - 4 - 2").unwrap(),
            Expr::Binary {
                op: BinOp::Sub,
                lhs: Box::new(Expr::Binary {
                    op: BinOp::Sub,
                    lhs: int(8),
                    rhs: int(4),
                }),
                rhs: int(2),
            }
        );
    }

    #[test]
    fn test_power_binds_tighter_than_unary_minus() {
        assert_eq!(
            parse("-2 ** 2").unwrap(),
            Expr::Neg(Box::new(Expr::Binary {
                op: BinOp::Pow,
                lhs: int(2),
                rhs: int(2),
            }))
        );
    }

    #[test]
    fn test_adjacent_strings_concatenate() {
        assert_eq!(parse("'ab' \"cd\"").unwrap(), Expr::Str("abcd".to_string()));
    }

    #[test]
    fn test_parenthesized_variable() {
        assert_eq!(parse("((x))").unwrap(), Expr::Var("x".to_string()));
    }

    #[test]
    fn test_parsing_errors() {
        assert_eq!(parse(""), Err(ParsingError::UnexpectedEnd));
        assert_eq!(parse("(1 + 2"), Err(ParsingError::UnexpectedEnd));
        assert_eq!(parse("1 2"), Err(ParsingError::UnexpectedToken(Token::Int(BigInt::from(2)))));
        assert_eq!(
            parse("hello world"),
            Err(ParsingError::UnexpectedToken(Token::Ident("world".to_string())))
        );
        assert_eq!(parse("* 3"), Err(ParsingError::UnexpectedToken(Token::Star)));
    }
}
