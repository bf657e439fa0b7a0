#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Integer(i64),
    Bool(bool),

    // Types
    Int,
    BoolType,

    // Declarations
    Proc,
    Func,
    Return,

    // Commands
    If,
    Else,
    While,
    Repeat,
    Until,
    Switch,
    Case,
    Default,

    // Operators
    Assign, // =
    Eq,     // ==
    Lt,
    Gt,
    Plus,
    Minus,
    Star,
    Slash,
    Not,

    // Punctuation
    LParen,
    RParen,
    Comma,
    Colon,
    Dot,
    DotDot,

    Ident(std::string::String),

    // Special
    Comment(std::string::String),
    Newline,
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{}", n),
            Token::Bool(b) => write!(f, "{}", b),
            Token::Int => write!(f, "int"),
            Token::BoolType => write!(f, "bool"),
            Token::Proc => write!(f, "proc"),
            Token::Func => write!(f, "func"),
            Token::Return => write!(f, "return"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::Repeat => write!(f, "repeat"),
            Token::Until => write!(f, "until"),
            Token::Switch => write!(f, "switch"),
            Token::Case => write!(f, "case"),
            Token::Default => write!(f, "default"),
            Token::Assign => write!(f, "="),
            Token::Eq => write!(f, "=="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Not => write!(f, "not"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::DotDot => write!(f, ".."),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Comment(s) => write!(f, "# {}", s),
            Token::Newline => write!(f, "\\n"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}
