//! Regex-driven tokenizer.
//!
//! The grammar is a table of `(symbol, pattern)` rules plus a skip pattern
//! for whitespace and `;` line comments. At each offset every rule is tried
//! anchored; the longest match wins and, among matches of equal length, the
//! rule declared later wins. That is what makes `123` an integer rather than
//! a key, `true` a boolean and `import` a keyword.
//!
//! Longest match also holds inside a rule. The rules are compiled to DFAs
//! that report every match, so `(\d+\.)|(\d+\.\d+)` takes all of `1.5`
//! instead of stopping at the first alternative that fits.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use regex_automata::dfa::{dense, Automaton};
use regex_automata::{Anchored, Input, MatchKind};

use crate::error::{Location, ParameterError, Position, Result};

/// Terminal symbols of the configuration grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Eoi,
    Key,
    Boolean,
    String,
    Real,
    Integer,
    Equal,
    EnumToken,
    Import,
    Override,
    Comma,
    LBracket,
    RBracket,
}

impl Symbol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Symbol::Eoi => "<eoi>",
            Symbol::Key => "<key>",
            Symbol::Boolean => "<boolean>",
            Symbol::String => "<string>",
            Symbol::Real => "<real>",
            Symbol::Integer => "<integer>",
            Symbol::Equal => "<equal>",
            Symbol::EnumToken => "<enum_token>",
            Symbol::Import => "<import>",
            Symbol::Override => "<override>",
            Symbol::Comma => "<comma>",
            Symbol::LBracket => "<lbracket>",
            Symbol::RBracket => "<rbracket>",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token rules in declaration order. Later rules win ties.
const GRAMMAR_RULES: &[(Symbol, &str)] = &[
    (Symbol::Key, r"[-_a-zA-Z0-9]+"),
    (Symbol::Boolean, r"(true)|(false)|(yes)|(no)|(on)|(off)"),
    (Symbol::String, r#""([^"\\]|(\\")|(\\\\))*""#),
    (
        Symbol::Real,
        r"[+-]?((\.\d+)|(\d+\.)|(\d+\.\d+)|(\d+))([eE][+-]?\d+)?",
    ),
    (Symbol::Integer, r"[+-]?\d+"),
    (Symbol::Equal, r"=|:|(->)"),
    (Symbol::EnumToken, r"#[-_a-zA-Z0-9]+"),
    (Symbol::Import, r"import"),
    (Symbol::Override, r"override"),
    (Symbol::Comma, r","),
    (Symbol::LBracket, r"\["),
    (Symbol::RBracket, r"\]"),
];

const SKIP_PATTERN: &str = r"(\s|(;[^\n]*\n))*";

/// A grammar rule compiled for longest-match search.
struct Rule {
    symbol: Symbol,
    dfa: dense::DFA<Vec<u32>>,
}

impl Rule {
    fn compile(symbol: Symbol, pattern: &str) -> Rule {
        let dfa = dense::Builder::new()
            .configure(dense::Config::new().match_kind(MatchKind::All))
            .build(pattern)
            .expect("grammar patterns are valid regexes");
        Rule { symbol, dfa }
    }

    /// Length of the longest match anchored at the start of `text`.
    fn longest_match(&self, text: &str) -> Option<usize> {
        let input = Input::new(text).anchored(Anchored::Yes);
        // No quit bytes are configured, so the search cannot fail.
        match self.dfa.try_search_fwd(&input) {
            Ok(found) => found.map(|m| m.offset()),
            Err(_) => None,
        }
    }
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    GRAMMAR_RULES
        .iter()
        .map(|(symbol, pattern)| Rule::compile(*symbol, pattern))
        .collect()
});

static SKIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^(?:{})", SKIP_PATTERN)).expect("skip pattern is a valid regex")
});

/// A lexeme with its symbol and where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub symbol: Symbol,
    /// The literal text as it appears in the source.
    pub text: &'a str,
    pub location: Location,
}

/// Produces tokens from a source string on demand.
pub struct Lexer<'a> {
    input: &'a str,
    source: Arc<str>,
    position: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, source: Arc<str>) -> Self {
        Lexer {
            input,
            source,
            position: Position::default(),
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.position.offset..]
    }

    fn advance(&mut self, text: &str) {
        self.position = self.position.advanced_by(text);
    }

    fn location(&self) -> Location {
        Location::new(self.source.clone(), self.position)
    }

    /// Read the next token. Once the input is exhausted this keeps
    /// returning `Eoi`.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        if let Some(skipped) = SKIP.find(self.remaining()) {
            let skipped = skipped.as_str();
            self.advance(skipped);
        }
        // A comment on the last line may end at end of input.
        if self.remaining().starts_with(';') && !self.remaining().contains('\n') {
            let comment = self.remaining();
            self.advance(comment);
        }

        let location = self.location();
        let rest = self.remaining();
        if rest.is_empty() {
            return Ok(Token {
                symbol: Symbol::Eoi,
                text: "",
                location,
            });
        }

        let mut best: Option<(Symbol, usize)> = None;
        for rule in RULES.iter() {
            if let Some(len) = rule.longest_match(rest) {
                if len > 0 && best.map_or(true, |(_, best_len)| len >= best_len) {
                    best = Some((rule.symbol, len));
                }
            }
        }

        match best {
            Some((symbol, len)) => {
                let text = &rest[..len];
                self.advance(text);
                Ok(Token {
                    symbol,
                    text,
                    location,
                })
            }
            None => {
                let text: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
                Err(ParameterError::UnrecognizedInput { text, location })
            }
        }
    }
}

/// One token of lookahead over a [`Lexer`].
pub struct TokenSource<'a> {
    lexer: Lexer<'a>,
    current: Token<'a>,
}

impl<'a> TokenSource<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(TokenSource { lexer, current })
    }

    pub fn peek(&self) -> &Token<'a> {
        &self.current
    }

    /// Consume the current token and read the following one.
    pub fn take(&mut self) -> Result<Token<'a>> {
        let following = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, following))
    }
}

/// Tokenize a whole string, including the trailing `Eoi`.
pub fn tokenize<'a>(input: &'a str, source: &str) -> Result<Vec<Token<'a>>> {
    let mut lexer = Lexer::new(input, Arc::from(source));
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.symbol == Symbol::Eoi;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn symbols(input: &str) -> Vec<Symbol> {
        tokenize(input, "<input>")
            .unwrap()
            .into_iter()
            .map(|t| t.symbol)
            .collect()
    }

    #[rstest]
    #[case("width", Symbol::Key)]
    #[case("left-bc_type", Symbol::Key)]
    #[case("123", Symbol::Integer)]
    #[case("-5", Symbol::Integer)]
    #[case("+7", Symbol::Integer)]
    #[case("1.5", Symbol::Real)]
    #[case(".5", Symbol::Real)]
    #[case("2.", Symbol::Real)]
    #[case("1e5", Symbol::Real)]
    #[case("-3.25E-2", Symbol::Real)]
    #[case("true", Symbol::Boolean)]
    #[case("off", Symbol::Boolean)]
    #[case("trueish", Symbol::Key)]
    #[case("import", Symbol::Import)]
    #[case("override", Symbol::Override)]
    #[case("overrides", Symbol::Key)]
    #[case("#neumann", Symbol::EnumToken)]
    #[case("\"a \\\"quoted\\\" word\"", Symbol::String)]
    #[case("=", Symbol::Equal)]
    #[case(":", Symbol::Equal)]
    #[case("->", Symbol::Equal)]
    #[case(",", Symbol::Comma)]
    #[case("[", Symbol::LBracket)]
    #[case("]", Symbol::RBracket)]
    fn classifies_single_tokens(#[case] input: &str, #[case] expected: Symbol) {
        assert_eq!(symbols(input), vec![expected, Symbol::Eoi]);
    }

    #[rstest]
    #[case("1.5", "1.5")]
    #[case("12.25e3", "12.25e3")]
    #[case("-1.5E-2", "-1.5E-2")]
    #[case("2.", "2.")]
    #[case("off", "off")]
    #[case("on", "on")]
    #[case("no", "no")]
    #[case("none", "none")]
    #[case("->", "->")]
    #[case("-", "-")]
    #[case("a-", "a-")]
    #[case("\"a\\\\\"", "\"a\\\\\"")]
    fn takes_the_longest_match_within_a_rule(#[case] input: &str, #[case] expected: &str) {
        let tokens = tokenize(input, "<input>").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, expected);
    }

    #[test]
    fn splits_reals_only_at_separators() {
        let tokens = tokenize("v = 1.5, -3.25E-2 [x -> .5]", "<input>").unwrap();
        let lexemes: Vec<(Symbol, &str)> = tokens.iter().map(|t| (t.symbol, t.text)).collect();
        assert_eq!(
            lexemes,
            vec![
                (Symbol::Key, "v"),
                (Symbol::Equal, "="),
                (Symbol::Real, "1.5"),
                (Symbol::Comma, ","),
                (Symbol::Real, "-3.25E-2"),
                (Symbol::LBracket, "["),
                (Symbol::Key, "x"),
                (Symbol::Equal, "->"),
                (Symbol::Real, ".5"),
                (Symbol::RBracket, "]"),
                (Symbol::Eoi, ""),
            ]
        );
    }

    #[test]
    fn arrow_directly_after_a_key_is_part_of_the_key() {
        let err = tokenize("a-> 1", "<input>").unwrap_err();
        match err {
            ParameterError::UnrecognizedInput { text, .. } => assert_eq!(text, ">"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn skips_whitespace_and_comments() {
        let input = "; leading comment\n  a = 1 ; trailing\n\tb -> 2\n";
        assert_eq!(
            symbols(input),
            vec![
                Symbol::Key,
                Symbol::Equal,
                Symbol::Integer,
                Symbol::Key,
                Symbol::Equal,
                Symbol::Integer,
                Symbol::Eoi
            ]
        );
    }

    #[test]
    fn comment_may_end_at_end_of_input() {
        assert_eq!(
            symbols("a = 1 ; last line"),
            vec![Symbol::Key, Symbol::Equal, Symbol::Integer, Symbol::Eoi]
        );
        assert_eq!(symbols(";only a comment"), vec![Symbol::Eoi]);
    }

    #[test]
    fn records_coordinates() {
        let tokens = tokenize("a = 1\n  bb = \"x\"", "run.cfg").unwrap();
        let bb = &tokens[3];
        assert_eq!(bb.text, "bb");
        assert_eq!(bb.location.position.line, 1);
        assert_eq!(bb.location.position.column, 2);
        assert_eq!(bb.location.position.offset, 8);
        assert_eq!(&*bb.location.source, "run.cfg");
    }

    #[test]
    fn keeps_returning_eoi() {
        let mut lexer = Lexer::new("a", Arc::from("<input>"));
        assert_eq!(lexer.next_token().unwrap().symbol, Symbol::Key);
        assert_eq!(lexer.next_token().unwrap().symbol, Symbol::Eoi);
        assert_eq!(lexer.next_token().unwrap().symbol, Symbol::Eoi);
    }

    #[test]
    fn rejects_unknown_characters() {
        let err = tokenize("a = 1\n@oops", "<input>").unwrap_err();
        match err {
            ParameterError::UnrecognizedInput { text, location } => {
                assert_eq!(text, "@oops");
                assert_eq!(location.position.line, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn token_source_peeks_without_consuming() {
        let lexer = Lexer::new("a = 1", Arc::from("<input>"));
        let mut source = TokenSource::new(lexer).unwrap();
        assert_eq!(source.peek().symbol, Symbol::Key);
        assert_eq!(source.peek().symbol, Symbol::Key);
        assert_eq!(source.take().unwrap().text, "a");
        assert_eq!(source.peek().symbol, Symbol::Equal);
    }
}
