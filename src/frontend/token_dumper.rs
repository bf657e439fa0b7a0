use crate::frontend::lexer::Spanned;
use crate::frontend::token::Token;

pub struct TokenDumper {
    pub color: bool,
    pub show_layout: bool, // if false, comments and newlines are skipped
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_layout: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const BLU: &'static str = "\x1b[34m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn compact(mut self) -> Self {
        self.show_layout = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        for line in self.render(tokens) {
            println!("{}", line);
        }
    }

    pub fn render(&self, tokens: &[Spanned]) -> Vec<String> {
        tokens
            .iter()
            .filter(|s| self.show_layout || !matches!(s.token, Token::Comment(_) | Token::Newline))
            .map(|s| self.render_one(s))
            .collect()
    }

    fn render_one(&self, s: &Spanned) -> String {
        let kind = self.kind(&s.token);
        let colr = if self.color { self.color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        format!(
            "[{:02}:{:02}] {}{:<8} {}{}",
            s.span.line, s.span.col, colr, kind, s.token, reset
        )
    }

    fn kind(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            Newline => "NEWLINE",
            Comment(_) => "COMMENT",
            Eof => "EOF",

            Integer(_) => "INT",
            Bool(_) => "BOOL",

            Ident(_) => "IDENT",

            Int | BoolType => "TYPE",

            LParen | RParen | Comma | Colon | Dot | DotDot => "PUNCT",

            Assign | Plus | Minus | Star | Slash | Not => "OP",
            Eq | Lt | Gt => "CMP",

            _ => "KEYWORD",
        }
    }

    fn color(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            Newline | Comment(_) | Eof => Self::DIM,
            Integer(_) | Bool(_) => Self::CYN,
            Ident(_) => Self::YEL,
            Int | BoolType => Self::BLU,
            Assign | Plus | Minus | Star | Slash | Not | Eq | Lt | Gt => Self::MAG,
            _ => Self::RESET,
        }
    }
}
