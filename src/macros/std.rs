//! Built-in prelude of global macros.
//!
//! The prelude is ordinary source text compiled into the binary; its `macro`
//! forms are loaded into a session's global tier before any module is
//! expanded.

use crate::{
    errors::CompileError,
    macros::{collect_macro_definitions, MacroRegistry},
    source::SourceMap,
    syntax::read_all,
};

pub const PRELUDE_NAME: &str = "<prelude>";
pub const PRELUDE_SOURCE: &str = include_str!("prelude.sprig");

/// Registers every prelude macro into `global`.
pub fn register_std_macros(global: &mut MacroRegistry, sources: &mut SourceMap) -> Result<(), CompileError> {
    let file = sources.add(PRELUDE_NAME, PRELUDE_SOURCE);
    let forms = read_all(&file)?;
    let prelude = collect_macro_definitions(&forms, &file, PRELUDE_NAME)?;
    for (name, def) in prelude.iter() {
        global.register(name, std::sync::Arc::clone(def));
    }
    Ok(())
}
