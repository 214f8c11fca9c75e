//! Host value model and the property-get semantics of `__sprig_get`.
//!
//! Generated code never inspects runtime shapes itself; dotted access with
//! non-identifier segments and `(get ..)` go through one helper. This module
//! is the reference for that helper: [`get_property`] dispatches on the shape
//! of the target exactly as the emitted JavaScript does.

use std::collections::BTreeMap;

use serde_json::Value as Json;

/// A JavaScript value as seen by the property-get helper.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>),
    Set(Vec<HostValue>),
    Map(Vec<(HostValue, HostValue)>),
    Object(BTreeMap<String, HostValue>),
    Function {
        name: String,
        properties: BTreeMap<String, HostValue>,
    },
}

impl HostValue {
    pub fn string(s: impl Into<String>) -> Self {
        HostValue::String(s.into())
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, HostValue)>) -> Self {
        HostValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    /// The key as a property name, the way JavaScript converts it.
    fn property_name(&self) -> Option<String> {
        match self {
            HostValue::String(s) => Some(s.clone()),
            HostValue::Number(n) => Some(crate::syntax::format_number(*n)),
            HostValue::Bool(b) => Some(b.to_string()),
            HostValue::Null => Some("null".to_string()),
            HostValue::Undefined => Some("undefined".to_string()),
            _ => None,
        }
    }

    fn array_index(&self) -> Option<usize> {
        match self {
            HostValue::Number(n) if n.fract() == 0.0 && *n >= 0.0 => Some(*n as usize),
            HostValue::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<Json> for HostValue {
    fn from(value: Json) -> Self {
        match value {
            Json::Null => HostValue::Null,
            Json::Bool(b) => HostValue::Bool(b),
            Json::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => HostValue::String(s),
            Json::Array(items) => HostValue::Array(items.into_iter().map(HostValue::from).collect()),
            Json::Object(map) => HostValue::Object(map.into_iter().map(|(k, v)| (k, HostValue::from(v))).collect()),
        }
    }
}

/// Keys tried in order: the key itself, then `-` replaced by `_`, then
/// camelCase. Non-string keys are tried as is.
pub fn key_candidates(key: &HostValue) -> Vec<HostValue> {
    let HostValue::String(name) = key else {
        return vec![key.clone()];
    };
    let mut out = vec![name.clone()];
    for candidate in [name.replace('-', "_"), camel_case(name)] {
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out.into_iter().map(HostValue::String).collect()
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '-' && ch != '_' {
            out.push(ch);
            continue;
        }
        let mut run = String::from(ch);
        while let Some(&next) = chars.peek() {
            if next != '-' && next != '_' {
                break;
            }
            run.push(next);
            chars.next();
        }
        match chars.peek() {
            Some(&next) if next.is_ascii_alphanumeric() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push_str(&run),
        }
    }
    out
}

/// `target[key]`, falling back to `default` when nothing matches. Only own
/// properties count: inherited members like `toString` or `map` never match.
pub fn get_property(target: &HostValue, key: &HostValue, default: HostValue) -> HostValue {
    if target.is_nullish() {
        return default;
    }
    for candidate in key_candidates(key) {
        if let Some(found) = lookup(target, &candidate) {
            return found;
        }
    }
    default
}

fn lookup(target: &HostValue, key: &HostValue) -> Option<HostValue> {
    match target {
        HostValue::Undefined | HostValue::Null => None,
        HostValue::Array(items) => match key.array_index() {
            Some(index) => items.get(index).cloned(),
            None if key.property_name().as_deref() == Some("length") => Some(HostValue::Number(items.len() as f64)),
            None => None,
        },
        HostValue::Set(items) => items.contains(key).then(|| key.clone()),
        HostValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()),
        HostValue::Object(properties) => properties.get(&key.property_name()?).cloned(),
        HostValue::Function { name, properties } => {
            let prop = key.property_name()?;
            match properties.get(&prop) {
                Some(value) => Some(value.clone()),
                None if prop == "name" => Some(HostValue::String(name.clone())),
                None => None,
            }
        }
        HostValue::String(s) => {
            if let Some(index) = key.array_index() {
                let units: Vec<u16> = s.encode_utf16().collect();
                return units
                    .get(index)
                    .map(|u| HostValue::String(String::from_utf16_lossy(&[*u])));
            }
            (key.property_name().as_deref() == Some("length"))
                .then(|| HostValue::Number(s.encode_utf16().count() as f64))
        }
        HostValue::Number(_) | HostValue::Bool(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn get(target: &HostValue, key: &str) -> HostValue {
        get_property(target, &HostValue::string(key), HostValue::string("dflt"))
    }

    #[test]
    fn hyphenated_keys_find_mangled_exports() {
        let module = HostValue::object([("double_five", HostValue::Number(10.0))]);
        assert_eq!(get(&module, "double-five"), HostValue::Number(10.0));
        let camel = HostValue::object([("doubleFive", HostValue::Number(10.0))]);
        assert_eq!(get(&camel, "double-five"), HostValue::Number(10.0));
        assert_eq!(get(&module, "missing"), HostValue::string("dflt"));
    }

    #[test]
    fn candidates_are_deduplicated() {
        assert_eq!(key_candidates(&HostValue::string("plain")), vec![HostValue::string("plain")]);
        assert_eq!(
            key_candidates(&HostValue::string("a-b")),
            vec![HostValue::string("a-b"), HostValue::string("a_b"), HostValue::string("aB")]
        );
        assert_eq!(key_candidates(&HostValue::Number(1.0)), vec![HostValue::Number(1.0)]);
    }

    #[test]
    fn nullish_targets_yield_default() {
        assert_eq!(get(&HostValue::Null, "x"), HostValue::string("dflt"));
        assert_eq!(get(&HostValue::Undefined, "x"), HostValue::string("dflt"));
    }

    #[test]
    fn arrays_index_in_range_and_expose_length() {
        let arr = HostValue::from(json!([1, 2, 3]));
        assert_eq!(get_property(&arr, &HostValue::Number(1.0), HostValue::Null), HostValue::Number(2.0));
        assert_eq!(get_property(&arr, &HostValue::Number(5.0), HostValue::Null), HostValue::Null);
        assert_eq!(get(&arr, "0"), HostValue::Number(1.0));
        assert_eq!(get(&arr, "length"), HostValue::Number(3.0));
    }

    #[test]
    fn sets_and_maps() {
        let set = HostValue::Set(vec![HostValue::string("a")]);
        assert_eq!(get(&set, "a"), HostValue::string("a"));
        assert_eq!(get(&set, "b"), HostValue::string("dflt"));
        let map = HostValue::Map(vec![(HostValue::Number(1.0), HostValue::string("one"))]);
        assert_eq!(get_property(&map, &HostValue::Number(1.0), HostValue::Null), HostValue::string("one"));
    }

    #[test]
    fn primitives_use_boxed_properties() {
        assert_eq!(get(&HostValue::string("abc"), "length"), HostValue::Number(3.0));
        assert_eq!(get(&HostValue::string("abc"), "1"), HostValue::string("b"));
        assert_eq!(get(&HostValue::Number(4.0), "x"), HostValue::string("dflt"));
    }

    #[test]
    fn inherited_members_fall_back_to_default() {
        let zero = || HostValue::Number(0.0);
        let empty = HostValue::object(Vec::<(String, HostValue)>::new());
        assert_eq!(get_property(&empty, &HostValue::string("toString"), zero()), zero());
        assert_eq!(get_property(&HostValue::Number(5.0), &HostValue::string("toFixed"), zero()), zero());
        let pair = HostValue::from(json!([1, 2]));
        assert_eq!(get_property(&pair, &HostValue::string("map"), zero()), zero());
        assert_eq!(get_property(&HostValue::string("ab"), &HostValue::string("slice"), zero()), zero());
    }

    #[test]
    fn missing_member_without_default_is_undefined() {
        let module = HostValue::object([("double_five", HostValue::Number(10.0))]);
        let missing = get_property(&module, &HostValue::string("missing-prop"), HostValue::Undefined);
        assert_eq!(missing, HostValue::Undefined);
    }

    #[test]
    fn functions_expose_name_and_properties() {
        let f = HostValue::Function {
            name: "add".into(),
            properties: BTreeMap::from([("arity".to_string(), HostValue::Number(2.0))]),
        };
        assert_eq!(get(&f, "name"), HostValue::string("add"));
        assert_eq!(get(&f, "arity"), HostValue::Number(2.0));
    }

    #[test]
    fn json_objects_convert() {
        let value = HostValue::from(json!({ "user-name": "ada", "nested": { "x": null } }));
        assert_eq!(get(&value, "user-name"), HostValue::string("ada"));
        let nested = get(&value, "nested");
        assert_eq!(get(&nested, "x"), HostValue::Null);
    }
}
