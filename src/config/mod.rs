//! Layered configuration store.
//!
//! Merges configuration from three kinds of sources, applied as options in
//! the order the caller lists them:
//! 1. **Defaults** - [`with_defaults`] fallback values (always lowest)
//! 2. **Environment** - [`with_env`] variables named `<PREFIX>_<KEY>`
//! 3. **Files** - [`with_filepath`] YAML or JSON documents
//!
//! ## Merge Strategy
//! - Environment and file values deep-merge field-by-field; later options win
//! - Default values answer only for keys no other source set
//! - Schema defaults on [`ConfigStruct`] sit beneath everything
//!
//! ## Keys
//! Keys are case-insensitive dotted paths (`app.config.port`). The
//! environment variable for a key upper-cases it and replaces dots with
//! underscores (`CONFIG_APP_CONFIG_PORT`).

pub mod decode;
mod merge;
mod options;
mod schema;
mod source;
mod store;
mod value;

pub use decode::{DecodeError, WeakDeserializer};
pub use merge::{deep_merge, deep_merge_all};
pub use options::{ConfigOption, with_defaults, with_env, with_filepath};
pub use schema::{
    CONFIG_SCHEMA, ConfigStruct, FieldKind, FieldSpec, FieldValue, apply_defaults,
    validate_required_fields,
};
pub use source::{ENV_BOUND_KEYS, SourceFormat, env_var_name};
pub use store::Config;
pub use value::parse_bool;
