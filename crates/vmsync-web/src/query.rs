//! Read-only query language for the `makes` collection.
//!
//! Accepts a GraphQL-shaped selection document such as
//! `{ makes { makeId vehicleTypes { typeName } } }` and projects stored
//! makes onto the selected fields.

use serde_json::{Map as JsonMap, Value as JsonValue};
use vmsync_core::Make;

const MAKE_FIELDS: &[&str] = &["makeId", "makeName", "vehicleTypes"];
const TYPE_FIELDS: &[&str] = &["typeId", "typeName"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub selection: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Name(String),
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' => tokens.push(Token::Open),
            '}' => tokens.push(Token::Close),
            c if c.is_whitespace() || c == ',' => {}
            '#' => {
                while chars.peek().is_some_and(|(_, c)| *c != '\n') {
                    chars.next();
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::from(c);
                while let Some((_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            other => return Err(format!("unexpected character '{other}' at offset {pos}")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn selection_set(&mut self) -> Result<Vec<Field>, String> {
        match self.next() {
            Some(Token::Open) => {}
            _ => return Err("expected '{'".into()),
        }
        let mut fields = Vec::new();
        loop {
            match self.next() {
                Some(Token::Close) => break,
                Some(Token::Name(name)) => {
                    let selection = if self.peek() == Some(&Token::Open) {
                        self.selection_set()?
                    } else {
                        Vec::new()
                    };
                    fields.push(Field { name, selection });
                }
                Some(Token::Open) => return Err("unexpected '{'".into()),
                None => return Err("unterminated selection set".into()),
            }
        }
        if fields.is_empty() {
            return Err("selection set must not be empty".into());
        }
        Ok(fields)
    }
}

/// Parse a query document into its top-level selection.
pub fn parse_query(source: &str) -> Result<Vec<Field>, String> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
    };
    match parser.peek() {
        Some(Token::Name(op)) if op == "query" => {
            parser.next();
            if matches!(parser.peek(), Some(Token::Name(_))) {
                parser.next();
            }
        }
        Some(Token::Name(op)) if op == "mutation" || op == "subscription" => {
            return Err(format!("{op} operations are not supported"));
        }
        _ => {}
    }
    let fields = parser.selection_set()?;
    if parser.peek().is_some() {
        return Err("unexpected content after selection set".into());
    }
    Ok(fields)
}

fn check_fields(fields: &[Field], allowed: &[&str], parent: &str) -> Result<(), String> {
    for field in fields {
        if !allowed.contains(&field.name.as_str()) {
            return Err(format!("cannot query field '{}' on type '{parent}'", field.name));
        }
    }
    Ok(())
}

/// Validate the document against the `makes` schema and return the make
/// selection.
pub fn makes_selection(fields: &[Field]) -> Result<&[Field], String> {
    check_fields(fields, &["makes"], "Query")?;
    let makes = &fields[0];
    if fields.len() > 1 {
        return Err("only a single 'makes' field may be selected".into());
    }
    if makes.selection.is_empty() {
        return Err("field 'makes' must have a selection of subfields".into());
    }
    check_fields(&makes.selection, MAKE_FIELDS, "Make")?;
    for field in &makes.selection {
        match field.name.as_str() {
            "vehicleTypes" if field.selection.is_empty() => {
                return Err("field 'vehicleTypes' must have a selection of subfields".into());
            }
            "vehicleTypes" => check_fields(&field.selection, TYPE_FIELDS, "VehicleType")?,
            name if !field.selection.is_empty() => {
                return Err(format!("field '{name}' is a scalar and takes no selection"));
            }
            _ => {}
        }
    }
    Ok(&makes.selection)
}

fn project(value: &JsonValue, selection: &[Field]) -> JsonValue {
    match value {
        JsonValue::Array(items) => {
            JsonValue::Array(items.iter().map(|item| project(item, selection)).collect())
        }
        JsonValue::Object(object) => {
            let mut out = JsonMap::new();
            for field in selection {
                let child = object.get(&field.name).cloned().unwrap_or(JsonValue::Null);
                let child = if field.selection.is_empty() {
                    child
                } else {
                    project(&child, &field.selection)
                };
                out.insert(field.name.clone(), child);
            }
            JsonValue::Object(out)
        }
        other => other.clone(),
    }
}

pub fn project_makes(makes: &[Make], selection: &[Field]) -> Result<JsonValue, serde_json::Error> {
    let value = serde_json::to_value(makes)?;
    Ok(project(&value, selection))
}
