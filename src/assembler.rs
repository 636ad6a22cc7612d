// First line of every listing. No blank line follows it.
pub const HEADER: &str = "; Assembly-like representation";

/// Rewrites intermediate code line by line. Only the shape of each line is
/// inspected: assignments become `MOV`, branches pass through, and everything
/// else (labels) is commented out.
pub fn generate(intermediate: &str) -> String {
    let mut asm = vec![HEADER.to_owned()];
    asm.extend(intermediate.lines().map(rewrite_line));
    asm.join("\n")
}

fn rewrite_line(line: &str) -> String {
    if let Some((left, right)) = line.split_once('=') {
        format!("MOV {}, {}", left.trim(), right.trim())
    } else if line.contains("goto") {
        line.to_owned()
    } else {
        format!("; {line}")
    }
}
