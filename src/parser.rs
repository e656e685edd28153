use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::collection::{Collection, MultiValue};
use crate::diagnostics::Warning;
use crate::error::{Location, ParameterError, Result};
use crate::lexer::{Lexer, Symbol, Token, TokenSource};
use crate::value::{Value, ValueKind};

/// A parsed `[override] key = v1, v2, ...` statement that has not been
/// committed to the collection yet.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueDefinition {
    pub overrides: bool,
    pub key: String,
    pub values: Vec<Value>,
    pub location: Location,
}

/// A file currently being parsed.
#[derive(Debug)]
struct Frame {
    path: PathBuf,
    /// Canonical form when available, used to detect import cycles.
    identity: PathBuf,
}

/// Folds parsed definitions into a [`Collection`].
///
/// The loader keeps a stack of the files being parsed. Relative imports
/// resolve against the directory of the innermost file, or against
/// `base_dir` when parsing text that has no file behind it.
pub(crate) struct Loader<'c> {
    collection: &'c mut Collection,
    base_dir: PathBuf,
    files: Vec<Frame>,
    warnings: Vec<Warning>,
}

/// Keeps a file on the loader's stack for as long as it is alive. Dropping
/// the scope pops the file, whether parsing succeeded or not.
struct ImportScope<'l, 'c> {
    loader: &'l mut Loader<'c>,
}

impl<'l, 'c> ImportScope<'l, 'c> {
    fn enter(loader: &'l mut Loader<'c>, frame: Frame) -> Self {
        loader.files.push(frame);
        ImportScope { loader }
    }
}

impl<'c> Deref for ImportScope<'_, 'c> {
    type Target = Loader<'c>;

    fn deref(&self) -> &Self::Target {
        self.loader
    }
}

impl DerefMut for ImportScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.loader
    }
}

impl Drop for ImportScope<'_, '_> {
    fn drop(&mut self) {
        self.loader.files.pop();
    }
}

impl<'c> Loader<'c> {
    pub(crate) fn new(collection: &'c mut Collection, base_dir: &Path) -> Self {
        Loader {
            collection,
            base_dir: base_dir.to_path_buf(),
            files: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    /// The directory relative paths are resolved against right now.
    fn current_dir(&self) -> &Path {
        self.files
            .last()
            .and_then(|frame| frame.path.parent())
            .unwrap_or(&self.base_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir().join(path)
        }
    }

    // ── Files ───────────────────────────────────────────────────────

    pub(crate) fn load_file(&mut self, path: &Path) -> Result<()> {
        let resolved = self.resolve(path);
        let identity = fs::canonicalize(&resolved).unwrap_or_else(|_| resolved.clone());
        if self.files.iter().any(|frame| frame.identity == identity) {
            return Err(ParameterError::ImportCycle { path: resolved });
        }

        let source = fs::read_to_string(&resolved).map_err(|source| {
            ParameterError::FileAccess {
                path: resolved.clone(),
                source,
            }
        })?;
        tracing::debug!(path = %resolved.display(), depth = self.files.len(), "loading parameter file");

        let name = resolved.display().to_string();
        let mut scope = ImportScope::enter(
            self,
            Frame {
                path: resolved,
                identity,
            },
        );
        scope.parse_source(&source, &name)
    }

    pub(crate) fn parse_source(&mut self, source: &str, name: &str) -> Result<()> {
        let lexer = Lexer::new(source, Arc::from(name));
        let mut tokens = TokenSource::new(lexer)?;
        self.parse_parameter_list(&mut tokens)
    }

    // ── Statements ──────────────────────────────────────────────────

    fn parse_parameter_list(&mut self, tokens: &mut TokenSource<'_>) -> Result<()> {
        loop {
            match tokens.peek().symbol {
                Symbol::Eoi => return Ok(()),
                Symbol::Key | Symbol::Override => {
                    let definition = parse_definition(tokens)?;
                    self.commit(vec![definition])?;
                }
                Symbol::LBracket => self.parse_group(tokens)?,
                Symbol::Import => self.parse_import(tokens)?,
                _ => {
                    return Err(unexpected(
                        tokens.peek(),
                        "a <key>, <override>, <lbracket> or <import> token",
                    ))
                }
            }
        }
    }

    /// `[ definition* ]`: every definition shares one new axis.
    fn parse_group(&mut self, tokens: &mut TokenSource<'_>) -> Result<()> {
        expect(tokens, Symbol::LBracket, "a <lbracket> token")?;

        let mut definitions: Vec<KeyValueDefinition> = Vec::new();
        loop {
            match tokens.peek().symbol {
                Symbol::RBracket => {
                    tokens.take()?;
                    break;
                }
                Symbol::Key | Symbol::Override => {
                    let definition = parse_definition(tokens)?;
                    if let Some(first) = definitions.first() {
                        if first.values.len() != definition.values.len() {
                            return Err(ParameterError::GroupSizeMismatch {
                                key: definition.key,
                                expected: first.values.len(),
                                found: definition.values.len(),
                                location: definition.location,
                            });
                        }
                    }
                    definitions.push(definition);
                }
                _ => {
                    return Err(unexpected(
                        tokens.peek(),
                        "a <key>, <override> or <rbracket> token",
                    ))
                }
            }
        }

        if definitions.is_empty() {
            return Ok(());
        }
        self.commit(definitions)
    }

    /// `import "path"`: parse the named file in place.
    fn parse_import(&mut self, tokens: &mut TokenSource<'_>) -> Result<()> {
        expect(tokens, Symbol::Import, "an <import> token")?;
        let path_token = expect(tokens, Symbol::String, "a <string> token")?;
        let path = unescape(path_token.text);
        tracing::debug!(import = %path, at = %path_token.location, "following import");
        self.load_file(Path::new(&path))
    }

    // ── Committing ──────────────────────────────────────────────────

    /// Bind `definitions` to one fresh axis. Definitions are applied in
    /// order, so a later one may override an earlier one in the same group.
    fn commit(&mut self, definitions: Vec<KeyValueDefinition>) -> Result<()> {
        self.check_overrides(&definitions)?;

        let size = definitions.first().map_or(1, |d| d.values.len());
        let next_axis = self.collection.axis_sizes().len();
        if self.collection.size_with_axis(next_axis, size).is_none() {
            let key = definitions.first().map(|d| d.key.clone()).unwrap_or_default();
            return Err(ParameterError::TooManyCombinations { key });
        }
        let axis = self.collection.add_axis(size);
        for definition in definitions {
            let KeyValueDefinition {
                overrides,
                key,
                values,
                location,
            } = definition;
            let redefined = self
                .collection
                .set_key_value(&key, MultiValue::new(axis, values))?;
            if redefined && !overrides {
                let warning = Warning { key, location };
                tracing::warn!("{}", warning);
                self.warnings.push(warning);
            }
        }
        Ok(())
    }

    fn check_overrides(&self, definitions: &[KeyValueDefinition]) -> Result<()> {
        let mut defined_here: Vec<&str> = Vec::new();
        for definition in definitions {
            let known = self.collection.contains_key(&definition.key)
                || defined_here.contains(&definition.key.as_str());
            if definition.overrides && !known {
                return Err(ParameterError::DanglingOverride {
                    key: definition.key.clone(),
                    location: definition.location.clone(),
                });
            }
            defined_here.push(&definition.key);
        }
        Ok(())
    }
}

// ── Definitions & Values ────────────────────────────────────────────

fn parse_definition(tokens: &mut TokenSource<'_>) -> Result<KeyValueDefinition> {
    let overrides = tokens.peek().symbol == Symbol::Override;
    if overrides {
        tokens.take()?;
    }
    let key = expect(tokens, Symbol::Key, "a <key> token")?;
    expect(tokens, Symbol::Equal, "an <equal> token")?;
    let values = parse_value_list(tokens)?;

    Ok(KeyValueDefinition {
        overrides,
        key: key.text.to_string(),
        values,
        location: key.location,
    })
}

fn parse_value_list(tokens: &mut TokenSource<'_>) -> Result<Vec<Value>> {
    let mut values = vec![parse_value(tokens)?];
    while tokens.peek().symbol == Symbol::Comma {
        tokens.take()?;
        values.push(parse_value(tokens)?);
    }
    Ok(values)
}

fn parse_value(tokens: &mut TokenSource<'_>) -> Result<Value> {
    let token = tokens.take()?;
    match token.symbol {
        Symbol::Integer => token
            .text
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| conversion_error(&token, ValueKind::Integer)),
        Symbol::Real => match token.text.parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(Value::Real(x)),
            _ => Err(conversion_error(&token, ValueKind::Real)),
        },
        Symbol::Boolean => match token.text {
            "true" | "yes" | "on" => Ok(Value::Boolean(true)),
            "false" | "no" | "off" => Ok(Value::Boolean(false)),
            _ => Err(conversion_error(&token, ValueKind::Boolean)),
        },
        Symbol::String => Ok(Value::String(unescape(token.text))),
        Symbol::EnumToken => Ok(Value::EnumToken(token.text[1..].to_string())),
        Symbol::Key => Ok(Value::Reference(token.text.to_string())),
        _ => Err(unexpected(&token, "a <value> token")),
    }
}

/// Strip the surrounding quotes of a string literal and drop the backslash
/// of every escape, keeping the escaped character.
fn unescape(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(ch);
        }
    }
    result
}

// ── Helpers ─────────────────────────────────────────────────────────

fn expect<'a>(
    tokens: &mut TokenSource<'a>,
    symbol: Symbol,
    expected: &'static str,
) -> Result<Token<'a>> {
    let token = tokens.take()?;
    if token.symbol == symbol {
        Ok(token)
    } else {
        Err(unexpected(&token, expected))
    }
}

fn unexpected(token: &Token<'_>, expected: &'static str) -> ParameterError {
    ParameterError::Syntax {
        expected,
        found: token.symbol,
        location: token.location.clone(),
    }
}

fn conversion_error(token: &Token<'_>, target: ValueKind) -> ParameterError {
    ParameterError::Conversion {
        text: token.text.to_string(),
        target,
        location: token.location.clone(),
    }
}
