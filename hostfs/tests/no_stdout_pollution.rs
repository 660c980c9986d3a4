use std::fs;
use walkdir::WalkDir;

// The library reports through `log`; it must never write to stdout.
#[test]
fn test_no_stdout_pollution() {
    let src_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/src");
    let mut violations = Vec::new();

    for entry in WalkDir::new(src_dir) {
        let entry = entry.unwrap();
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "rs") {
            continue;
        }

        let content = fs::read_to_string(path).unwrap();
        for (i, line) in content.lines().enumerate() {
            if line.trim().starts_with("//") {
                continue;
            }
            if line.contains("println!(") || line.contains("print!(") || line.contains("dbg!(") {
                violations.push(format!("{}:{}: {}", path.display(), i + 1, line.trim()));
            }
        }
    }

    if !violations.is_empty() {
        panic!(
            "Found stdout printing macros in library source. \
             Use log::debug!/warn! instead.\nViolations:\n{}",
            violations.join("\n")
        );
    }
}
