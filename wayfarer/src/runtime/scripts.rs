use redis::Script;
use std::sync::LazyLock;

pub const COMMON_PRELUDE: &str = include_str!("../../lua/common.lua");
pub const DOCUMENT_INSERT_SCRIPT_BODY: &str = include_str!("../../lua/document_insert.lua");
pub const DOCUMENT_PATCH_SCRIPT_BODY: &str = include_str!("../../lua/document_patch.lua");
pub const DOCUMENT_DELETE_SCRIPT_BODY: &str = include_str!("../../lua/document_delete.lua");
pub const DOCUMENT_GET_OR_CREATE_SCRIPT_BODY: &str = include_str!("../../lua/document_get_or_create.lua");
pub const EDGE_TOGGLE_SCRIPT_BODY: &str = include_str!("../../lua/edge_toggle.lua");

fn with_prelude(body: &str) -> Script {
    Script::new(&format!("{COMMON_PRELUDE}\n{body}"))
}

pub static DOCUMENT_INSERT_SCRIPT: LazyLock<Script> = LazyLock::new(|| with_prelude(DOCUMENT_INSERT_SCRIPT_BODY));
pub static DOCUMENT_PATCH_SCRIPT: LazyLock<Script> = LazyLock::new(|| with_prelude(DOCUMENT_PATCH_SCRIPT_BODY));
pub static DOCUMENT_DELETE_SCRIPT: LazyLock<Script> = LazyLock::new(|| with_prelude(DOCUMENT_DELETE_SCRIPT_BODY));
pub static DOCUMENT_GET_OR_CREATE_SCRIPT: LazyLock<Script> =
    LazyLock::new(|| with_prelude(DOCUMENT_GET_OR_CREATE_SCRIPT_BODY));
pub static EDGE_TOGGLE_SCRIPT: LazyLock<Script> = LazyLock::new(|| with_prelude(EDGE_TOGGLE_SCRIPT_BODY));
