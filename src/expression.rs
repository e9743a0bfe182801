//! Angle functions typed by the user, `x` is the time in seconds.
//!
//! Grammar, lowest precedence first:
//! ```text
//! expr    = term (('+' | '-') term)*
//! term    = unary (('*' | '/') unary)*
//! unary   = ('-' | '+') unary | power
//! power   = primary (('^' | '**') unary)?
//! primary = number | '(' expr ')' | name | name '(' expr (',' expr)* ')'
//! ```
//! `power` is right-associative and `-x^2` reads as `-(x^2)`. Runs of `+ -`
//! and `* /` are kept flat, signs, exponents and brackets may nest at most
//! [`MAX_NESTING`] levels.

use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, one_of},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value},
    error::ErrorKind,
    multi::{many0, many0_count, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    Finish, IResult,
};

pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected input at position {position}: '{rest}'")]
    Syntax { position: usize, rest: String },

    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Func1 {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Sign,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Func2 {
    Log,
    Atan2,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var,
    Neg(Box<Expr>),
    /// Left-associative run such as `a - b + c`
    Chain(Box<Expr>, Vec<(BinOp, Expr)>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call1(Func1, Box<Expr>),
    Call2(Func2, Box<Expr>, Box<Expr>),
}

impl BinOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }
}

impl Func1 {
    fn apply(self, v: f64) -> f64 {
        match self {
            Func1::Sin => v.sin(),
            Func1::Cos => v.cos(),
            Func1::Tan => v.tan(),
            Func1::Asin => v.asin(),
            Func1::Acos => v.acos(),
            Func1::Atan => v.atan(),
            Func1::Sinh => v.sinh(),
            Func1::Cosh => v.cosh(),
            Func1::Tanh => v.tanh(),
            Func1::Exp => v.exp(),
            Func1::Ln => v.ln(),
            Func1::Sqrt => v.sqrt(),
            Func1::Abs => v.abs(),
            Func1::Floor => v.floor(),
            Func1::Ceil => v.ceil(),
            // sign(0) == 0, unlike f64::signum
            Func1::Sign => {
                if v > 0.0 {
                    1.0
                } else if v < 0.0 {
                    -1.0
                } else {
                    v
                }
            }
        }
    }
}

impl Func2 {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Func2::Log => a.ln() / b.ln(),
            Func2::Atan2 => a.atan2(b),
            Func2::Min => a.min(b),
            Func2::Max => a.max(b),
        }
    }
}

impl Expr {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        if input.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        match all_consuming(ws(|i| expr(i, 0)))(input).finish() {
            Ok((_, ast)) => ast.lower(),
            Err(e) if e.code == ErrorKind::TooLarge => Err(ParseError::TooDeep(MAX_NESTING)),
            Err(e) => Err(ParseError::Syntax {
                position: input.len() - e.input.len(),
                rest: e.input.chars().take(16).collect(),
            }),
        }
    }

    pub fn eval(&self, x: f64) -> f64 {
        match self {
            Expr::Num(v) => *v,
            Expr::Var => x,
            Expr::Neg(e) => -e.eval(x),
            Expr::Chain(first, rest) => rest
                .iter()
                .fold(first.eval(x), |acc, (op, e)| op.apply(acc, e.eval(x))),
            Expr::Binary(op, a, b) => op.apply(a.eval(x), b.eval(x)),
            Expr::Call1(f, a) => f.apply(a.eval(x)),
            Expr::Call2(f, a, b) => f.apply(a.eval(x), b.eval(x)),
        }
    }

    /// True if the expression does not depend on `x`
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Num(_) => true,
            Expr::Var => false,
            Expr::Neg(e) | Expr::Call1(_, e) => e.is_constant(),
            Expr::Chain(first, rest) => {
                first.is_constant() && rest.iter().all(|(_, e)| e.is_constant())
            }
            Expr::Binary(_, a, b) | Expr::Call2(_, a, b) => a.is_constant() && b.is_constant(),
        }
    }
}

impl FromStr for Expr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expr::parse(s)
    }
}

//-----------------------------------------------------------------------------

// Names are resolved after the syntax pass, so errors can say what was wrong.
#[derive(Debug, Clone)]
enum Ast {
    Num(f64),
    Name(String),
    Call(String, Vec<Ast>),
    Neg(Box<Ast>),
    Chain(Box<Ast>, Vec<(BinOp, Ast)>),
    Binary(BinOp, Box<Ast>, Box<Ast>),
}

impl Ast {
    fn lower(self) -> Result<Expr, ParseError> {
        match self {
            Ast::Num(v) => Ok(Expr::Num(v)),
            Ast::Name(name) => match name.as_str() {
                "x" => Ok(Expr::Var),
                "pi" => Ok(Expr::Num(std::f64::consts::PI)),
                "E" => Ok(Expr::Num(std::f64::consts::E)),
                _ => Err(ParseError::UnknownName(name)),
            },
            Ast::Neg(a) => Ok(Expr::Neg(Box::new(a.lower()?))),
            Ast::Chain(first, rest) => Ok(Expr::Chain(
                Box::new(first.lower()?),
                rest.into_iter()
                    .map(|(op, a)| Ok((op, a.lower()?)))
                    .collect::<Result<_, ParseError>>()?,
            )),
            Ast::Binary(op, a, b) => Ok(Expr::Binary(
                op,
                Box::new(a.lower()?),
                Box::new(b.lower()?),
            )),
            Ast::Call(name, args) => lower_call(name, args),
        }
    }
}

fn func1(name: &str) -> Option<Func1> {
    Some(match name {
        "sin" => Func1::Sin,
        "cos" => Func1::Cos,
        "tan" => Func1::Tan,
        "asin" => Func1::Asin,
        "acos" => Func1::Acos,
        "atan" => Func1::Atan,
        "sinh" => Func1::Sinh,
        "cosh" => Func1::Cosh,
        "tanh" => Func1::Tanh,
        "exp" => Func1::Exp,
        "log" | "ln" => Func1::Ln,
        "sqrt" => Func1::Sqrt,
        "abs" | "Abs" => Func1::Abs,
        "floor" => Func1::Floor,
        "ceil" | "ceiling" => Func1::Ceil,
        "sign" => Func1::Sign,
        _ => return None,
    })
}

fn func2(name: &str) -> Option<Func2> {
    Some(match name {
        "log" => Func2::Log,
        "atan2" => Func2::Atan2,
        "min" | "Min" => Func2::Min,
        "max" | "Max" => Func2::Max,
        _ => return None,
    })
}

fn lower_call(name: String, args: Vec<Ast>) -> Result<Expr, ParseError> {
    let unary = func1(&name);
    let binary = func2(&name);

    let expected = match (unary.is_some(), binary.is_some()) {
        (false, false) => return Err(ParseError::UnknownName(name)),
        (true, true) => "1 or 2",
        (true, false) => "1",
        (false, true) => "2",
    };

    let got = args.len();
    let mut args = args.into_iter();
    match (got, unary, binary) {
        (1, Some(f), _) => Ok(Expr::Call1(f, Box::new(next_arg(&mut args)?))),
        (2, _, Some(f)) => {
            let a = next_arg(&mut args)?;
            let b = next_arg(&mut args)?;
            Ok(Expr::Call2(f, Box::new(a), Box::new(b)))
        }
        _ => Err(ParseError::Arity {
            name,
            expected,
            got,
        }),
    }
}

fn next_arg(args: &mut impl Iterator<Item = Ast>) -> Result<Expr, ParseError> {
    args.next().ok_or(ParseError::Empty)?.lower()
}

//-----------------------------------------------------------------------------

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        f64::from_str,
    )(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn name_or_call(input: &str, depth: usize) -> IResult<&str, Ast> {
    let (input, name) = identifier(input)?;
    let (input, args) = opt(delimited(
        ws(char('(')),
        separated_list1(char(','), ws(|i| expr(i, depth))),
        char(')'),
    ))(input)?;

    let ast = match args {
        Some(args) => Ast::Call(name.to_owned(), args),
        None => Ast::Name(name.to_owned()),
    };
    Ok((input, ast))
}

fn primary(input: &str, depth: usize) -> IResult<&str, Ast> {
    ws(alt((
        map(number, Ast::Num),
        delimited(char('('), ws(|i| expr(i, depth)), char(')')),
        |i| name_or_call(i, depth),
    )))(input)
}

fn power(input: &str, depth: usize) -> IResult<&str, Ast> {
    let (input, base) = primary(input, depth)?;
    let (input, exponent) =
        opt(preceded(alt((tag("**"), tag("^"))), |i| unary(i, depth)))(input)?;

    let ast = match exponent {
        Some(exponent) => Ast::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)),
        None => base,
    };
    Ok((input, ast))
}

// Every recursive path of the grammar passes through here.
fn unary(input: &str, depth: usize) -> IResult<&str, Ast> {
    if depth >= MAX_NESTING {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    let depth = depth + 1;

    let result = ws(alt((
        map(preceded(char('-'), |i| unary(i, depth)), |a| {
            Ast::Neg(Box::new(a))
        }),
        preceded(char('+'), |i| unary(i, depth)),
        |i| power(i, depth),
    )))(input);
    result
}

fn chain(first: Ast, rest: Vec<(BinOp, Ast)>) -> Ast {
    if rest.is_empty() {
        first
    } else {
        Ast::Chain(Box::new(first), rest)
    }
}

fn term(input: &str, depth: usize) -> IResult<&str, Ast> {
    let (input, first) = unary(input, depth)?;
    let (input, rest) = many0(pair(
        alt((
            value(BinOp::Mul, terminated(char('*'), not(char('*')))),
            value(BinOp::Div, char('/')),
        )),
        |i| unary(i, depth),
    ))(input)?;
    Ok((input, chain(first, rest)))
}

fn expr(input: &str, depth: usize) -> IResult<&str, Ast> {
    let (input, first) = term(input, depth)?;
    let (input, rest) = many0(pair(
        alt((value(BinOp::Add, char('+')), value(BinOp::Sub, char('-')))),
        |i| term(i, depth),
    ))(input)?;
    Ok((input, chain(first, rest)))
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    fn eval(s: &str, x: f64) -> f64 {
        Expr::parse(s).unwrap().eval(x)
    }

    #[test]
    fn test_numbers() {
        assert_eq!(eval("42", 0.0), 42.0);
        assert_eq!(eval("1.5", 0.0), 1.5);
        assert_eq!(eval(".25", 0.0), 0.25);
        assert_eq!(eval("2.", 0.0), 2.0);
        assert_eq!(eval("1e-3", 0.0), 0.001);
        assert_eq!(eval("2.5E2", 0.0), 250.0);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3", 0.0), 7.0);
        assert_eq!(eval("(1 + 2) * 3", 0.0), 9.0);
        assert_eq!(eval("10 - 4 - 3", 0.0), 3.0);
        assert_eq!(eval("24 / 4 / 3", 0.0), 2.0);
        assert_eq!(eval("2 * x + 1", 3.0), 7.0);
    }

    #[test]
    fn test_power() {
        assert_eq!(eval("2^3", 0.0), 8.0);
        assert_eq!(eval("2**3", 0.0), 8.0);
        // right-assoc
        assert_eq!(eval("2^3^2", 0.0), 512.0);
        assert_eq!(eval("-x^2", 3.0), -9.0);
        assert_eq!(eval("x**-1", 4.0), 0.25);
        assert_eq!(eval("3*x**2", 2.0), 12.0);
    }

    #[test]
    fn test_unary() {
        assert_eq!(eval("-x", 2.0), -2.0);
        assert_eq!(eval("--x", 2.0), 2.0);
        assert_eq!(eval("+x", 2.0), 2.0);
        assert_eq!(eval("1 - -1", 0.0), 2.0);
    }

    #[test]
    fn test_functions_and_constants() {
        assert_relative_eq!(eval("sin(pi/2)", 0.0), 1.0);
        assert_relative_eq!(eval("cos(0)", 0.0), 1.0);
        assert_relative_eq!(eval("log(E)", 0.0), 1.0);
        assert_relative_eq!(eval("log(8, 2)", 0.0), 3.0);
        assert_relative_eq!(eval("sqrt(x)", 16.0), 4.0);
        assert_eq!(eval("Abs(x)", -3.0), 3.0);
        assert_eq!(eval("max(x, 1)", 0.0), 1.0);
        assert_eq!(eval("Min(x, 1)", 0.0), 0.0);
        assert_eq!(eval("sign(x)", 0.0), 0.0);
        assert_eq!(eval("sign(x)", -2.0), -1.0);
        assert_eq!(eval("ceiling(x)", 1.2), 2.0);
        assert_relative_eq!(eval("30 * sin(2*pi*x/6)", 1.5), 30.0);
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(eval("  x  *  ( 2 + 1 )  ", 2.0), 6.0);
        assert_eq!(eval("max( x , 2 )", 1.0), 2.0);
    }

    #[test]
    fn test_errors() {
        assert_eq!(Expr::parse("  "), Err(ParseError::Empty));
        assert_eq!(
            Expr::parse("y + 1"),
            Err(ParseError::UnknownName("y".to_owned()))
        );
        assert_eq!(
            Expr::parse("foo(x)"),
            Err(ParseError::UnknownName("foo".to_owned()))
        );
        assert!(matches!(
            Expr::parse("sin(x, 2)"),
            Err(ParseError::Arity { got: 2, .. })
        ));
        assert!(matches!(
            Expr::parse("atan2(x)"),
            Err(ParseError::Arity { got: 1, .. })
        ));
        assert!(matches!(Expr::parse("x +"), Err(ParseError::Syntax { .. })));
        assert!(matches!(Expr::parse("(x"), Err(ParseError::Syntax { .. })));
        assert!(matches!(Expr::parse("2x"), Err(ParseError::Syntax { .. })));
    }

    #[test]
    fn test_syntax_error_position() {
        match Expr::parse("x + )") {
            Err(ParseError::Syntax { position, .. }) => assert_eq!(position, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nesting_limit() {
        let signs = "-".repeat(50_000) + "x";
        assert_eq!(
            Expr::parse(&signs),
            Err(ParseError::TooDeep(MAX_NESTING))
        );

        let brackets = "(".repeat(10_000) + "x" + &")".repeat(10_000);
        assert_eq!(
            Expr::parse(&brackets),
            Err(ParseError::TooDeep(MAX_NESTING))
        );

        let powers = "x^".repeat(10_000) + "x";
        assert_eq!(
            Expr::parse(&powers),
            Err(ParseError::TooDeep(MAX_NESTING))
        );

        let ok = "(".repeat(20) + "x" + &")".repeat(20);
        assert_eq!(eval(&ok, 3.0), 3.0);
        assert_eq!(eval(&("-".repeat(20) + "x"), 3.0), 3.0);
    }

    #[test]
    fn test_long_runs_stay_flat() {
        let sum = "x+".repeat(20_000) + "x";
        assert_eq!(eval(&sum, 1.0), 20_001.0);

        let diff = "100".to_owned() + &"-1".repeat(50_000);
        assert_eq!(eval(&diff, 0.0), -49_900.0);

        assert!(!Expr::parse(&sum).unwrap().is_constant());
    }

    #[test]
    fn test_is_constant() {
        assert!(Expr::parse("2 * pi").unwrap().is_constant());
        assert!(!Expr::parse("sin(x)").unwrap().is_constant());
    }
}
