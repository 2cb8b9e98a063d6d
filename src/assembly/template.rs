//! Payload templates for auto-generated events
//!
//! String values of a payload template are rendered through a
//! [`TemplateEngine`]; nested objects are walked recursively and every other
//! value is copied as is.

use rand::distributions::{Alphanumeric, DistString};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};

use crate::common::{Error, Result};

/// Renders one template string
pub trait TemplateEngine: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, template: &str) -> Result<String>;
}

/// Leaves every template untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct VerbatimTemplates;

impl TemplateEngine for VerbatimTemplates {
    fn name(&self) -> &str {
        "verbatim"
    }

    fn render(&self, template: &str) -> Result<String> {
        Ok(template.to_string())
    }
}

/// Expands `#{...}` random-value expressions
///
/// An expression that fails to evaluate stays in the output as written; the
/// others in the same string are still expanded.
///
/// Supported calls:
/// - `randomRange(min, max)` inclusive integer
/// - `randomFrom('a', 'b', ...)` one of the options
/// - `randomString(len, 'english' | 'alphanumeric' | 'digits')`
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTemplates;

impl TemplateEngine for RandomTemplates {
    fn name(&self) -> &str {
        "random"
    }

    fn render(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("#{") {
            out.push_str(&rest[..start]);
            let body = &rest[start + 2..];
            let end = body
                .find('}')
                .ok_or_else(|| Error::Config(format!("unterminated expression in '{}'", template)))?;
            let expression = &body[..end];
            match evaluate(expression) {
                Ok(value) => out.push_str(&value),
                Err(e) => {
                    tracing::warn!(%expression, error = %e, "Expression failed, keeping literal");
                    out.push_str(&rest[start..start + end + 3]);
                }
            }
            rest = &body[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn evaluate(expression: &str) -> Result<String> {
    let expression = expression.trim();
    let (name, args) = expression
        .strip_suffix(')')
        .and_then(|e| e.split_once('('))
        .ok_or_else(|| Error::Config(format!("'{}' is not a function call", expression)))?;
    let args: Vec<&str> = args
        .split(',')
        .map(|a| a.trim().trim_matches(|c: char| c == '[' || c == ']').trim().trim_matches('\''))
        .filter(|a| !a.is_empty())
        .collect();
    let mut rng = rand::thread_rng();

    match (name.trim(), args.as_slice()) {
        ("randomRange", [min, max]) => {
            let (min, max) = (int_arg(min)?, int_arg(max)?);
            if min > max {
                return Err(Error::Config(format!("randomRange({}, {}) is empty", min, max)));
            }
            Ok(rng.gen_range(min..=max).to_string())
        }
        ("randomFrom", options) if !options.is_empty() => options
            .choose(&mut rng)
            .map(|o| o.to_string())
            .ok_or_else(|| Error::Internal("no option chosen".to_string())),
        ("randomString", [len, charset]) => {
            let len = int_arg(len)?.max(0) as usize;
            Ok(match *charset {
                "english" => (0..len)
                    .map(|_| {
                        let c = rng.gen_range(0..52u8);
                        if c < 26 {
                            (b'a' + c) as char
                        } else {
                            (b'A' + c - 26) as char
                        }
                    })
                    .collect(),
                "alphanumeric" => Alphanumeric.sample_string(&mut rng, len),
                _ => (0..len)
                    .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                    .collect(),
            })
        }
        (name, _) => Err(Error::Config(format!(
            "unsupported template call '{}' with {} argument(s)",
            name,
            args.len()
        ))),
    }
}

fn int_arg(arg: &str) -> Result<i64> {
    arg.parse()
        .map_err(|_| Error::Config(format!("expected an integer, got '{}'", arg)))
}

/// Render a payload template
///
/// A string that fails to render keeps its literal text.
pub fn process_payload(engine: &dyn TemplateEngine, template: &Map<String, Value>) -> Map<String, Value> {
    template
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => match engine.render(s) {
                    Ok(r) => Value::String(r),
                    Err(e) => {
                        tracing::warn!(engine = engine.name(), template = %s, error = %e, "Template render failed, keeping literal");
                        Value::String(s.clone())
                    }
                },
                Value::Object(nested) => Value::Object(process_payload(engine, nested)),
                other => other.clone(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_verbatim_copies_everything() {
        let template = as_map(json!({"temp": "#{randomRange(1, 5)}", "n": 3}));
        assert_eq!(process_payload(&VerbatimTemplates, &template), template);
    }

    #[test]
    fn test_random_range_stays_in_bounds() {
        for _ in 0..50 {
            let v: i64 = RandomTemplates
                .render("#{randomRange(18, 22)}")
                .unwrap()
                .parse()
                .unwrap();
            assert!((18..=22).contains(&v));
        }
    }

    #[test]
    fn test_random_from_and_string() {
        let picked = RandomTemplates
            .render("mode=#{randomFrom(['eco','boost'])}")
            .unwrap();
        assert!(picked == "mode=eco" || picked == "mode=boost");

        let s = RandomTemplates.render("#{randomString(8, 'digits')}").unwrap();
        assert_eq!(s.len(), 8);
        assert!(s.chars().all(|c| c.is_ascii_digit()));

        let e = RandomTemplates.render("#{randomString(6, 'english')}").unwrap();
        assert!(e.chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn test_nested_objects_and_failures() {
        let template = as_map(json!({
            "reading": {"value": "#{randomRange(1, 1)}", "unit": "C"},
            "broken": "#{nope(1)}",
            "flag": true
        }));
        let payload = process_payload(&RandomTemplates, &template);
        assert_eq!(payload["reading"]["value"], "1");
        assert_eq!(payload["reading"]["unit"], "C");
        assert_eq!(payload["broken"], "#{nope(1)}");
        assert_eq!(payload["flag"], true);
    }

    #[test]
    fn test_failed_expression_keeps_only_its_literal() {
        let rendered = RandomTemplates
            .render("#{randomRange(1, 1)}-#{nope(1)}-#{randomFrom('x')}")
            .unwrap();
        assert_eq!(rendered, "1-#{nope(1)}-x");

        let template = as_map(json!({"label": "t#{randomRange(2, 2)} #{randomRange(9, 1)}"}));
        let payload = process_payload(&RandomTemplates, &template);
        assert_eq!(payload["label"], "t2 #{randomRange(9, 1)}");

        assert!(RandomTemplates.render("#{randomRange(1, 2)").is_err());
    }
}
