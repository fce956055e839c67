//! Text templates for generated tool bundles.
//!
//! Output is deterministic for identical inputs apart from embedded timestamps.

use crate::detection::gap::{CapabilityGap, GapType, Requirements};
use crate::generation::metadata::ToolMetadata;
use chrono::Utc;
use std::fmt::Write as _;

/// Functions rendered into code samples and test stubs.
const MAX_RENDERED_FUNCTIONS: usize = 5;
const MAX_RENDERED_DEPENDENCIES: usize = 5;

const ECHO: &str = "echo";
/// Function name and handler id of the input check added to most tools.
pub const VALIDATE_INPUT: &str = "validate_input";

/// Function-to-handler bindings of a generated manifest. Core functions are
/// bound to `echo`; every tool except a format gap also gets `validate_input`.
pub fn manifest_bindings(
    core_functions: &[String],
    gap_type: GapType,
) -> Vec<(String, &'static str)> {
    let mut bindings: Vec<(String, &'static str)> =
        core_functions.iter().map(|f| (f.clone(), ECHO)).collect();
    if gap_type != GapType::Format && !core_functions.iter().any(|f| f == VALIDATE_INPUT) {
        bindings.push((VALIDATE_INPUT.to_string(), VALIDATE_INPUT));
    }
    bindings
}

/// Render `SKILL.md`: front matter followed by the standard sections.
pub fn render_skill_doc(tool_name: &str, requirements: &Requirements, gap: &CapabilityGap) -> String {
    let functions = &requirements.core_functions;
    let bindings = manifest_bindings(functions, gap.gap_type);
    let entry_point = bindings
        .iter()
        .find(|(_, handler)| *handler == VALIDATE_INPUT)
        .or(bindings.first())
        .map_or(VALIDATE_INPUT, |(func, _)| func.as_str());

    format!(
        "---\n\
         name: {tool_name}\n\
         description: {description}\n\
         generated_at: {generated_at}\n\
         capability_gap: {gap_type}\n\
         complexity: {complexity}\n\
         ---\n\
         \n\
         # {title}\n\
         \n\
         ## Overview\n\
         \n\
         {overview}\n\
         \n\
         ## Core Capabilities\n\
         \n\
         {capabilities}\n\
         ## Implementation Pattern\n\
         \n\
         {implementation}\n\
         ## Integration Points\n\
         \n\
         {integration}\n\
         ## Usage Examples\n\
         \n\
         {usage}\n\
         ## Testing\n\
         \n\
         {testing}\n\
         ## Performance Notes\n\
         \n\
         {performance}\n\
         ## Future Enhancements\n\
         \n\
         {future}",
        description = gap.description,
        generated_at = Utc::now().to_rfc3339(),
        gap_type = gap.gap_type,
        complexity = gap.complexity_score,
        title = format_title(tool_name),
        overview = overview(gap),
        capabilities = capabilities(functions, &requirements.success_criteria),
        implementation = implementation_pattern(&bindings),
        integration = integration_points(tool_name, &requirements.dependencies, entry_point),
        usage = usage_examples(tool_name, functions),
        testing = testing_section(tool_name, functions),
        performance = performance_notes(gap.complexity_score),
        future = FUTURE_ENHANCEMENTS,
    )
}

/// Render `metadata.json`.
pub fn render_metadata(tool_name: &str, requirements: &Requirements, gap: &CapabilityGap) -> String {
    let metadata = ToolMetadata::for_gap(tool_name, requirements, gap);
    // Serializing a plain struct of strings and numbers cannot fail.
    serde_json::to_string_pretty(&metadata).unwrap_or_default()
}

/// Render `tests.sh`: a basic and an error-handling test per core function,
/// each calling the tool's own function through the host binary.
pub fn render_tests(tool_name: &str, core_functions: &[String]) -> String {
    let mut script = format!(
        "#!/bin/sh\n\
         # Tests for the {tool_name} tool.\n\
         # Each test calls the tool's own functions through the host binary.\n\
         \n\
         TOOLSMITH_BIN=\"${{TOOLSMITH_BIN:-toolsmith}}\"\n\
         TOOL=\"{tool_name}\"\n\
         failures=0\n\
         \n\
         run_test() {{\n\
         \x20   if \"$1\" >/dev/null 2>&1; then\n\
         \x20       echo \"ok - $1\"\n\
         \x20   else\n\
         \x20       echo \"FAIL - $1\"\n\
         \x20       failures=$((failures + 1))\n\
         \x20   fi\n\
         }}\n"
    );

    for func in core_functions.iter().take(MAX_RENDERED_FUNCTIONS) {
        let _ = write!(
            script,
            "\n\
             test_{func}_basic() {{\n\
             \x20   \"$TOOLSMITH_BIN\" invoke \"$TOOL\" {func} '{{\"test\": \"data\"}}'\n\
             }}\n\
             \n\
             test_{func}_error_handling() {{\n\
             \x20   ! \"$TOOLSMITH_BIN\" invoke \"$TOOL\" {func} 'null'\n\
             }}\n"
        );
    }

    script.push('\n');
    for func in core_functions.iter().take(MAX_RENDERED_FUNCTIONS) {
        let _ = writeln!(script, "run_test test_{func}_basic");
        let _ = writeln!(script, "run_test test_{func}_error_handling");
    }

    script.push_str(
        "\n\
         if [ \"$failures\" -ne 0 ]; then\n\
         \x20   echo \"$failures test(s) failed\"\n\
         \x20   exit 1\n\
         fi\n\
         echo \"all tests passed\"\n",
    );

    script
}

pub fn render_readme(tool_name: &str) -> String {
    format!(
        "# {}\n\nSee {} for full documentation.\n",
        format_title(tool_name),
        crate::layout::SKILL_DOC
    )
}

/// `pdf-reader` becomes `Pdf Reader`.
pub fn format_title(tool_name: &str) -> String {
    tool_name
        .split('-')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `read_pdf` becomes `Read Pdf`.
fn readable(func: &str) -> String {
    func.split('_')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn overview(gap: &CapabilityGap) -> String {
    format!(
        "This skill provides {}.\n\
         \n\
         **Why This Tool Was Created:**\n\
         - Capability Gap: {}\n\
         - Confidence: {:.1}%\n\
         - Generated to fulfill unmet capability requirements\n\
         \n\
         The tool is modular and is loaded by the host through its function manifest.\n",
        gap.description,
        gap.gap_type,
        gap.confidence * 100.0
    )
}

fn capabilities(functions: &[String], success_criteria: &[String]) -> String {
    let mut out = String::from("This tool provides the following core capabilities:\n\n");

    for func in functions {
        let _ = writeln!(
            out,
            "- **{}**: Handles {} operations",
            readable(func),
            func.replace('_', " ")
        );
    }

    if !success_criteria.is_empty() {
        out.push_str("\n**Success Criteria:**\n\n");
        for criterion in success_criteria {
            let _ = writeln!(out, "- {criterion}");
        }
    }

    out
}

fn implementation_pattern(bindings: &[(String, &str)]) -> String {
    let rendered: Vec<&(String, &str)> = bindings.iter().take(MAX_RENDERED_FUNCTIONS).collect();

    let mut out = String::from("### Function Manifest\n\n");
    let _ = writeln!(
        out,
        "Place an `{}` file beside this document. Each function maps to a handler\n\
         registered in the host process.\n",
        crate::layout::IMPLEMENTATION
    );
    out.push_str("```json\n{\n  \"functions\": {\n");
    for (i, (func, handler)) in rendered.iter().enumerate() {
        let comma = if i + 1 < rendered.len() { "," } else { "" };
        let _ = writeln!(out, "    \"{func}\": \"{handler}\"{comma}");
    }
    out.push_str("  }\n}\n```\n\n### Handler Contract\n\n```rust\n");

    for (func, _) in rendered.iter().filter(|(_, handler)| *handler == ECHO) {
        let _ = write!(
            out,
            "/// {title} operation.\n\
             fn {func}(input: &serde_json::Value) -> Result<serde_json::Value, String> {{\n\
             \x20   if input.is_null() {{\n\
             \x20       return Err(\"Invalid input\".to_string());\n\
             \x20   }}\n\
             \x20   Ok(serde_json::json!({{\n\
             \x20       \"success\": true,\n\
             \x20       \"data\": input,\n\
             \x20       \"metadata\": {{ \"function\": \"{func}\" }}\n\
             \x20   }}))\n\
             }}\n\
             \n",
            title = readable(func),
        );
    }
    out.push_str("```\n");

    out
}

/// `entry_point` is the function the pipeline example feeds upstream output into.
fn integration_points(tool_name: &str, dependencies: &[String], entry_point: &str) -> String {
    let Some(first) = dependencies.first() else {
        return "This tool operates independently with no external dependencies.\n".to_string();
    };

    let mut out = String::from("This tool integrates with:\n\n");
    for dep in dependencies.iter().take(MAX_RENDERED_DEPENDENCIES) {
        let _ = writeln!(out, "- **{}**: Used for {} operations", dep, dep.to_lowercase());
    }

    let _ = write!(
        out,
        "\n**Integration Pattern:**\n\
         \n\
         ```bash\n\
         # Feed the output of a {dep} tool into this one\n\
         upstream=$(toolsmith invoke {dep_lower}-tool process '{{}}')\n\
         toolsmith invoke {tool_name} {entry_point} \"$upstream\"\n\
         ```\n",
        dep = first,
        dep_lower = first.to_lowercase(),
    );

    out
}

fn usage_examples(tool_name: &str, functions: &[String]) -> String {
    let mut out = String::from("### Basic Usage\n\n```bash\n");

    if let Some(first) = functions.first() {
        let _ = writeln!(
            out,
            "toolsmith load {tool_name}\n\
             toolsmith invoke {tool_name} {first} '{{\"example\": \"data\"}}'"
        );
    }
    out.push_str("```\n\n");

    if let [first, second, ..] = functions {
        let _ = write!(
            out,
            "### Advanced Usage\n\
             \n\
             ```bash\n\
             # Chain two functions\n\
             step1=$(toolsmith invoke {tool_name} {first} '{{\"input\": \"example\"}}')\n\
             toolsmith invoke {tool_name} {second} \"$step1\"\n\
             ```\n"
        );
    }

    out
}

fn testing_section(tool_name: &str, functions: &[String]) -> String {
    let mut out = String::from("**Test Coverage:**\n\n");

    for func in functions.iter().take(MAX_RENDERED_FUNCTIONS) {
        let _ = writeln!(out, "- `test_{func}_basic`: Basic functionality test");
        let _ = writeln!(out, "- `test_{func}_error_handling`: Error handling test");
    }

    let _ = write!(
        out,
        "\n**Run Tests:**\n\
         \n\
         ```bash\n\
         sh {tool_name}/{}\n\
         ```\n",
        crate::layout::TESTS
    );

    out
}

fn performance_notes(complexity: f64) -> String {
    let (level, notes) = if complexity < 4.0 {
        (
            "lightweight and fast",
            "This tool has minimal overhead and performs efficiently.",
        )
    } else if complexity < 7.0 {
        (
            "moderate complexity",
            "This tool performs well for typical use cases. Consider caching for repeated operations.",
        )
    } else {
        (
            "complex",
            "This tool handles complex operations. Performance may vary based on input size.",
        )
    };

    format!("**Complexity Level:** {level} ({complexity}/10)\n\n{notes}\n")
}

const FUTURE_ENHANCEMENTS: &str = "Planned improvements for v2.0:\n\
\n\
- Performance optimization and caching\n\
- Extended error handling and validation\n\
- Batch processing support\n\
- Integration with additional tools\n\
- Enhanced documentation and examples\n";
