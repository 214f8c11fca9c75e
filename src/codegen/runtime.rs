//! JavaScript sources of the runtime helpers generated code calls.
//!
//! `__sprig_get` mirrors [`crate::interop::get_property`]: only own
//! properties match, so inherited members such as `toString` fall back to the
//! default.

pub const LIST: &str = "__sprig_list";
pub const VECTOR: &str = "__sprig_vector";
pub const HASH_MAP: &str = "__sprig_hash_map";
pub const HASH_SET: &str = "__sprig_hash_set";
pub const STR: &str = "__sprig_str";
pub const GET: &str = "__sprig_get";

pub struct Helper {
    pub name: &'static str,
    pub source: &'static str,
}

pub const HELPERS: &[Helper] = &[
    Helper {
        name: LIST,
        source: "function __sprig_list(...items) {
  return items;
}",
    },
    Helper {
        name: VECTOR,
        source: "function __sprig_vector(...items) {
  return items;
}",
    },
    Helper {
        name: HASH_MAP,
        source: "function __sprig_hash_map(...entries) {
  const map = new Map();
  for (let i = 0; i + 1 < entries.length; i += 2) {
    map.set(entries[i], entries[i + 1]);
  }
  return map;
}",
    },
    Helper {
        name: HASH_SET,
        source: "function __sprig_hash_set(...items) {
  return new Set(items);
}",
    },
    Helper {
        name: STR,
        source: "function __sprig_str(...parts) {
  let out = \"\";
  for (const part of parts) {
    if (part !== null && part !== undefined) out += String(part);
  }
  return out;
}",
    },
    Helper {
        name: GET,
        source: "function __sprig_get(target, key, dflt) {
  if (target === null || target === undefined) return dflt;
  const keys = [key];
  if (typeof key === \"string\") {
    const snake = key.replace(/-/g, \"_\");
    const camel = key.replace(/[-_]+([a-zA-Z0-9])/g, (_, c) => c.toUpperCase());
    if (!keys.includes(snake)) keys.push(snake);
    if (!keys.includes(camel)) keys.push(camel);
  }
  const own = Object.prototype.hasOwnProperty;
  for (const k of keys) {
    if (Array.isArray(target)) {
      const index = typeof k === \"number\" ? k : (typeof k === \"string\" && /^[0-9]+$/.test(k) ? Number(k) : NaN);
      if (Number.isInteger(index)) {
        if (index >= 0 && index < target.length) return target[index];
        continue;
      }
      if (own.call(target, k)) return target[k];
    } else if (target instanceof Set) {
      if (target.has(k)) return k;
    } else if (target instanceof Map) {
      if (target.has(k)) return target.get(k);
    } else {
      const boxed = Object(target);
      if (own.call(boxed, k)) return boxed[k];
    }
  }
  return dflt;
}",
    },
];

pub fn helper_source(name: &str) -> Option<&'static str> {
    HELPERS.iter().find(|h| h.name == name).map(|h| h.source)
}

/// The text of the shared runtime module every generated module imports from.
pub fn runtime_module_source() -> String {
    let mut out = String::from("// Sprig runtime helpers\n");
    for helper in HELPERS {
        out.push_str("\nexport ");
        out.push_str(helper.source);
        out.push('\n');
    }
    out
}
