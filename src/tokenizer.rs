//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The scanner is maximal-munch and eager. It knows the keyword table and the
//! operator set but nothing about grammar. Two-character operators are decided
//! by peeking one byte past the leading character. Comments survive as a single
//! `Comment` token so tooling can see them; the parser-facing buffer in
//! `parser` drops them.

use std::fmt;

use log::trace;

/// Lexical categories shared by the scanner and the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
  Ident,
  Num,

  // keywords
  Bool,
  Else,
  For,
  If,
  Char,
  Int,
  Long,
  Void,
  Return,
  Read,
  While,
  Write,
  True,
  False,
  Const,

  // operators and punctuation
  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  Lt,
  Gt,
  Le,
  Ge,
  EqEq,
  Ne,
  Assign,
  OrOr,
  AndAnd,
  Not,
  Semi,
  LParen,
  RParen,
  LBracket,
  RBracket,
  LBrace,
  RBrace,
  Colon,
  Comma,

  Comment,
  Error,
  Eof,
}

impl Tag {
  /// Human-readable name used when a token of this tag was expected.
  pub fn describe(self) -> &'static str {
    match self {
      Tag::Ident => "identifier",
      Tag::Num => "number",
      Tag::Bool => "'bool'",
      Tag::Else => "'else'",
      Tag::For => "'for'",
      Tag::If => "'if'",
      Tag::Char => "'char'",
      Tag::Int => "'int'",
      Tag::Long => "'long'",
      Tag::Void => "'void'",
      Tag::Return => "'return'",
      Tag::Read => "'read'",
      Tag::While => "'while'",
      Tag::Write => "'write'",
      Tag::True => "'true'",
      Tag::False => "'false'",
      Tag::Const => "'const'",
      Tag::Plus => "'+'",
      Tag::Minus => "'-'",
      Tag::Star => "'*'",
      Tag::Slash => "'/'",
      Tag::Percent => "'%'",
      Tag::Lt => "'<'",
      Tag::Gt => "'>'",
      Tag::Le => "'<='",
      Tag::Ge => "'>='",
      Tag::EqEq => "'=='",
      Tag::Ne => "'!='",
      Tag::Assign => "'='",
      Tag::OrOr => "'||'",
      Tag::AndAnd => "'&&'",
      Tag::Not => "'!'",
      Tag::Semi => "';'",
      Tag::LParen => "'('",
      Tag::RParen => "')'",
      Tag::LBracket => "'['",
      Tag::RBracket => "']'",
      Tag::LBrace => "'{'",
      Tag::RBrace => "'}'",
      Tag::Colon => "':'",
      Tag::Comma => "','",
      Tag::Comment => "comment",
      Tag::Error => "invalid input",
      Tag::Eof => "end of input",
    }
  }

  /// Keywords that name a type.
  pub fn is_type(self) -> bool {
    matches!(
      self,
      Tag::Bool | Tag::Char | Tag::Int | Tag::Long | Tag::Void
    )
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.describe())
  }
}

/// A lexeme together with its category and the 1-based line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub tag: Tag,
  pub text: String,
  pub line: usize,
}

impl Token {
  pub fn new(tag: Tag, text: impl Into<String>, line: usize) -> Self {
    Self {
      tag,
      text: text.into(),
      line,
    }
  }
}

fn keyword(word: &str) -> Option<Tag> {
  let tag = match word {
    "bool" => Tag::Bool,
    "else" => Tag::Else,
    "for" => Tag::For,
    "if" => Tag::If,
    "char" => Tag::Char,
    "int" => Tag::Int,
    "long" => Tag::Long,
    "void" => Tag::Void,
    "return" => Tag::Return,
    "read" => Tag::Read,
    "while" => Tag::While,
    "write" => Tag::Write,
    "true" => Tag::True,
    "false" => Tag::False,
    "const" => Tag::Const,
    _ => return None,
  };
  Some(tag)
}

/// Operators that may be followed by a second character forming a longer one.
fn two_char_operator(first: u8, second: u8) -> Option<Tag> {
  match (first, second) {
    (b'>', b'=') => Some(Tag::Ge),
    (b'<', b'=') => Some(Tag::Le),
    (b'=', b'=') => Some(Tag::EqEq),
    (b'!', b'=') => Some(Tag::Ne),
    (b'&', b'&') => Some(Tag::AndAnd),
    (b'|', b'|') => Some(Tag::OrOr),
    _ => None,
  }
}

fn one_char_operator(c: u8) -> Option<Tag> {
  let tag = match c {
    b'+' => Tag::Plus,
    b'-' => Tag::Minus,
    b'*' => Tag::Star,
    b'/' => Tag::Slash,
    b'%' => Tag::Percent,
    b'<' => Tag::Lt,
    b'>' => Tag::Gt,
    b'=' => Tag::Assign,
    b'!' => Tag::Not,
    b';' => Tag::Semi,
    b'(' => Tag::LParen,
    b')' => Tag::RParen,
    b'[' => Tag::LBracket,
    b']' => Tag::RBracket,
    b'{' => Tag::LBrace,
    b'}' => Tag::RBrace,
    b':' => Tag::Colon,
    b',' => Tag::Comma,
    _ => return None,
  };
  Some(tag)
}

struct Scanner<'a> {
  input: &'a str,
  bytes: &'a [u8],
  pos: usize,
  line: usize,
}

impl<'a> Scanner<'a> {
  fn new(input: &'a str) -> Self {
    Self {
      input,
      bytes: input.as_bytes(),
      pos: 0,
      line: 1,
    }
  }

  fn peek(&self) -> Option<u8> {
    self.bytes.get(self.pos).copied()
  }

  fn peek_next(&self) -> Option<u8> {
    self.bytes.get(self.pos + 1).copied()
  }

  fn bump(&mut self) {
    if self.peek() == Some(b'\n') {
      self.line += 1;
    }
    self.pos += 1;
  }

  fn eat_while(&mut self, predicate: impl Fn(u8) -> bool) {
    while self.peek().is_some_and(&predicate) {
      self.bump();
    }
  }

  fn next_token(&mut self) -> Token {
    self.eat_while(|c| c.is_ascii_whitespace());

    let line = self.line;
    let start = self.pos;
    let Some(c) = self.peek() else {
      return Token::new(Tag::Eof, "", line);
    };

    if c.is_ascii_alphabetic() {
      self.eat_while(|c| c.is_ascii_alphanumeric());
      let text = &self.input[start..self.pos];
      let tag = keyword(text).unwrap_or(Tag::Ident);
      return Token::new(tag, text, line);
    }

    if c.is_ascii_digit() {
      self.eat_while(|c| c.is_ascii_digit());
      return Token::new(Tag::Num, &self.input[start..self.pos], line);
    }

    if c == b'/' && self.peek_next() == Some(b'*') {
      return self.block_comment(start, line);
    }

    if let Some(next) = self.peek_next()
      && let Some(tag) = two_char_operator(c, next)
    {
      self.pos += 2;
      return Token::new(tag, &self.input[start..self.pos], line);
    }

    if let Some(tag) = one_char_operator(c) {
      self.bump();
      return Token::new(tag, &self.input[start..self.pos], line);
    }

    // Step over a whole UTF-8 scalar so the error token carries the real character.
    let width = self.input[start..].chars().next().map_or(1, char::len_utf8);
    self.pos += width;
    Token::new(Tag::Error, &self.input[start..self.pos], line)
  }

  /// Scan `/* ... */`. An unterminated comment swallows the rest of the input
  /// and becomes an error token anchored where it opened.
  fn block_comment(&mut self, start: usize, line: usize) -> Token {
    self.pos += 2;
    loop {
      match (self.peek(), self.peek_next()) {
        (Some(b'*'), Some(b'/')) => {
          self.pos += 2;
          return Token::new(Tag::Comment, &self.input[start..self.pos], line);
        }
        (Some(_), _) => self.bump(),
        (None, _) => return Token::new(Tag::Error, "/*", line),
      }
    }
  }
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> Vec<Token> {
  let mut scanner = Scanner::new(input);
  let mut tokens = Vec::new();
  loop {
    let token = scanner.next_token();
    let done = token.tag == Tag::Eof;
    tokens.push(token);
    if done {
      break;
    }
  }
  trace!("scanned {} tokens", tokens.len());
  tokens
}
