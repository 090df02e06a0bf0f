//! Registration of field types for textual field definition
//!
//! A [`FieldTypeRegistry`] maps a type-name string to the function which
//! parses that type's command text and constructs the field, plus an opaque
//! per-type configuration package.  It exists purely so a command interpreter
//! can author fields textually; the evaluation path never consults it.
//!
//! The registry is an explicit object: construct one, register types into
//! it, and hand it to whatever parses commands.  There is no process-wide
//! table.
//!
//! ```
//! use compfield::field::FieldModule;
//! use compfield::registry::FieldTypeRegistry;
//!
//! let registry = FieldTypeRegistry::standard();
//! let mut module = FieldModule::new();
//! let c = registry.define_field(&mut module, "constant values 1.5")?;
//! module.set_name(c, "temperature")?;
//! let s = registry.define_field(&mut module, "sin field temperature")?;
//! assert_eq!(module.command_string(s)?, "sin field temperature");
//! # Ok::<(), compfield::Error>(())
//! ```
use crate::field::{Field, FieldModule};
use crate::Error;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use log::error;

/// Parses one registered field type's command text and builds the field
pub type DefineFieldFn =
    fn(&mut FieldModule, &mut ParseState) -> Result<Field, Error>;

struct FieldTypeEntry {
    define: DefineFieldFn,
    package: Arc<dyn Any + Send + Sync>,
}

/// Map from field type name to its definer and configuration package
#[derive(Default)]
pub struct FieldTypeRegistry {
    entries: HashMap<String, FieldTypeEntry>,
}

impl FieldTypeRegistry {
    /// Builds an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry with every field type in this crate registered
    pub fn standard() -> Self {
        let mut registry = Self::new();
        // a fresh registry cannot hold duplicates
        crate::field::trigonometry::register_trigonometry_types(&mut registry)
            .ok();
        crate::field::composite::register_composite_types(&mut registry).ok();
        crate::field::mesh::register_mesh_types(&mut registry).ok();
        registry
    }

    /// Returns the number of registered types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers a field type under `name`
    ///
    /// Duplicate registration is an error, not a replacement.
    pub fn register(
        &mut self,
        name: &str,
        define: DefineFieldFn,
        package: Arc<dyn Any + Send + Sync>,
    ) -> Result<(), Error> {
        if self.entries.contains_key(name) {
            error!("register: field type \"{name}\" is already registered");
            return Err(Error::DuplicateType(name.to_owned()));
        }
        self.entries
            .insert(name.to_owned(), FieldTypeEntry { define, package });
        Ok(())
    }

    /// True if a type is registered under `name` (exact match)
    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the configuration package registered under `name`
    pub fn package(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.entries.get(name).map(|e| e.package.clone())
    }

    /// Parses a full field-definition command (`"<type> ..."`) and builds
    /// the field
    pub fn define_field(
        &self,
        module: &mut FieldModule,
        command: &str,
    ) -> Result<Field, Error> {
        let mut state = ParseState::new(command);
        let type_name = state
            .token()
            .map_err(|_| Error::ParseError("missing field type".to_owned()))?;
        let entry = self
            .entries
            .get(&type_name)
            .ok_or(Error::UnknownType(type_name))?;
        (entry.define)(module, &mut state)
    }
}

////////////////////////////////////////////////////////////////////////////

/// Tokenizer over field-definition command text
///
/// Tokens are whitespace-separated; a token may be double-quoted, in which
/// case `\"` and `\\` escapes are honored and the quotes are stripped.
pub struct ParseState {
    text: String,
    pos: usize,
}

impl ParseState {
    /// Starts parsing the given command text
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// True once all tokens are consumed
    pub fn is_finished(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.text.len()
    }

    /// Consumes and returns the next token
    pub fn token(&mut self) -> Result<String, Error> {
        self.skip_whitespace();
        let mut chars = self.text[self.pos..].char_indices().peekable();
        match chars.peek() {
            None => Err(Error::ParseError("unexpected end of command".to_owned())),
            Some((_, '"')) => {
                chars.next();
                let mut out = String::new();
                let mut escaped = false;
                for (i, c) in chars {
                    if escaped {
                        out.push(c);
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        self.pos += i + c.len_utf8();
                        return Ok(out);
                    } else {
                        out.push(c);
                    }
                }
                Err(Error::ParseError("unterminated quoted token".to_owned()))
            }
            Some(_) => {
                let rest = &self.text[self.pos..];
                let end = rest
                    .find(char::is_whitespace)
                    .unwrap_or(rest.len());
                let out = rest[..end].to_owned();
                self.pos += end;
                Ok(out)
            }
        }
    }

    /// Consumes the next token, requiring it to equal `keyword`
    pub fn expect_keyword(&mut self, keyword: &str) -> Result<(), Error> {
        let token = self.token()?;
        if token == keyword {
            Ok(())
        } else {
            Err(Error::ParseError(format!(
                "expected \"{keyword}\", found \"{token}\""
            )))
        }
    }
}

/// Renders a field name as a single command token, quoting it if it is not
/// bare-token safe
pub fn valid_token(name: &str) -> String {
    let bare_safe = !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if bare_safe {
        name.to_owned()
    } else {
        let mut out = String::with_capacity(name.len() + 2);
        out.push('"');
        for c in name.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn define_nothing(
        _module: &mut FieldModule,
        _state: &mut ParseState,
    ) -> Result<Field, Error> {
        Err(Error::InvalidArguments)
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut registry = FieldTypeRegistry::new();
        let package: Arc<dyn Any + Send + Sync> = Arc::new(());
        registry
            .register("custom", define_nothing, package.clone())
            .unwrap();
        assert!(matches!(
            registry.register("custom", define_nothing, package),
            Err(Error::DuplicateType(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let registry = FieldTypeRegistry::standard();
        let mut module = FieldModule::new();
        assert!(matches!(
            registry.define_field(&mut module, "warp field engage"),
            Err(Error::UnknownType(t)) if t == "warp"
        ));
    }

    #[test]
    fn standard_registry_has_the_built_in_types() {
        let registry = FieldTypeRegistry::standard();
        for name in
            ["sin", "cos", "tan", "asin", "acos", "atan", "atan2", "constant"]
        {
            assert!(registry.is_registered(name), "{name} missing");
        }
        assert!(!registry.is_registered("SIN"));
        assert!(registry.package("sin").is_some());
    }

    #[test]
    fn tokens_and_quoting() {
        let mut state = ParseState::new(r#"sin field "room \"A\" temp""#);
        assert_eq!(state.token().unwrap(), "sin");
        state.expect_keyword("field").unwrap();
        assert_eq!(state.token().unwrap(), r#"room "A" temp"#);
        assert!(state.is_finished());
        assert!(state.token().is_err());
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let mut state = ParseState::new(r#""never closed"#);
        assert!(matches!(state.token(), Err(Error::ParseError(_))));
    }

    #[test]
    fn valid_token_quotes_awkward_names() {
        assert_eq!(valid_token("temperature"), "temperature");
        assert_eq!(valid_token("t2.rest"), "t2.rest");
        assert_eq!(valid_token("room temp"), r#""room temp""#);
        assert_eq!(valid_token("2fast"), r#""2fast""#);
        assert_eq!(valid_token(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(valid_token(""), r#""""#);
    }
}
