//! Fixed cells imported from GDS.
//!
//! Generated by `cspdk import-gds`; regenerate instead of editing.

use cspdk::cells::{import_gds, Cell};
use cspdk::Result;

/// Directory containing the GDS files.
pub const GDS_DIR: &str = {{ gds_dir }};
{% for cell in cells %}
/// Loads `{{ cell.file_name }}`.
{%- if module %}
///
/// ```no_run
/// let cell = {{ module }}::{{ cell.name }}().unwrap();
/// ```
{%- endif %}
pub fn {{ cell.name }}() -> Result<Cell> {
    import_gds(GDS_DIR, {{ cell.file_literal }})
}
{% endfor -%}
