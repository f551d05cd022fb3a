//! Global constants used throughout the islet codebase.
//!
//! Naming conventions shared by the server output and the client bootstrap
//! live here so both sides of the hydration contract read the same values.

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "islet.toml";

/// File extension of single-file components.
pub const COMPONENT_EXTENSION: &str = "vue";

/// Default directory (relative to the project root) holding sub-components.
pub const DEFAULT_COMPONENTS_DIR: &str = "components";

/// Default URL path of the component-compilation endpoint.
pub const DEFAULT_CLIENT_MODULE_PATH: &str = "/_islet/module";

/// Query parameter carrying the component id on the compilation endpoint.
pub const CLIENT_MODULE_QUERY_PARAM: &str = "c";

/// Default ES module build of the client runtime, mapped to `vue` in the import map.
pub const DEFAULT_VUE_RUNTIME_URL: &str = "https://unpkg.com/vue@3/dist/vue.esm-browser.prod.js";

/// Default document title when the request logic assigns none.
pub const DEFAULT_TITLE: &str = "islet";

/// Page-global object mapping render instance ids to their state slices.
pub const STATE_GLOBAL: &str = "__ISLET_STATE__";

/// Prefix of the DOM id each render instance mounts on.
pub const MOUNT_ID_PREFIX: &str = "islet-";

/// Store key whose string value becomes the document title.
pub const TITLE_KEY: &str = "title";

/// Name of the runtime function server templates call for nested components.
pub const COMPONENT_FUNCTION: &str = "__component";

/// Reserved argument carrying the component tag name in `__component` calls.
pub const COMPONENT_NAME_ARG: &str = "__name";

/// Maximum nesting depth of components rendered inside one another.
///
/// Bounds runaway recursion when a component (directly or transitively)
/// renders itself.
pub const MAX_COMPONENT_DEPTH: usize = 32;

/// Length of the hex scope id derived from a component id.
pub const SCOPE_ID_LEN: usize = 8;
