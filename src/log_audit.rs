// Static analysis over every source file: tracing calls must not carry
// uploaded content or client-supplied file names. Opaque ids only.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    /// Field names and interpolations that would put upload content or
    /// client-controlled names into the log stream.
    const LEAK_PATTERNS: &[&str] = &[
        "file_name",
        "filename",
        "original_name",
        "page.text",
        "content.text",
        "text = ",
        "%text",
        "?text",
        "recognized",
        "payload =",
        "%payload",
        "?payload",
        "bytes =",
        "?bytes",
        "sheet.rows",
        "rows =",
        "?row",
        "cell =",
        "%cell",
        "?cell",
    ];

    const TRACING_MACROS: &[&str] = &[
        "tracing::info!",
        "tracing::warn!",
        "tracing::error!",
        "tracing::debug!",
        "tracing::trace!",
        "info!(",
        "warn!(",
        "error!(",
        "debug!(",
        "trace!(",
    ];

    /// This file names the patterns itself.
    const ALLOWLIST: &[&str] = &["log_audit.rs"];

    #[test]
    fn no_upload_content_in_tracing_calls() {
        let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
        assert!(src_dir.exists(), "Source directory not found: {}", src_dir.display());

        let mut violations = Vec::new();
        scan_directory(&src_dir, &src_dir, &mut violations);

        if !violations.is_empty() {
            let report = violations
                .iter()
                .map(|(file, line_num, call, pattern)| {
                    format!("  {file}:{line_num}: found '{pattern}' in: {call}")
                })
                .collect::<Vec<_>>()
                .join("\n");
            panic!(
                "LOG AUDIT FAILED, {} violation(s) in tracing calls:\n{report}\n\n\
                 Log opaque ids (source_id, upload_id) instead.",
                violations.len()
            );
        }
    }

    #[test]
    fn detects_known_violation() {
        let line = r#"tracing::info!(file_name = %source.file_name, "stored");"#;
        assert!(LEAK_PATTERNS.iter().any(|p| line.contains(p)));
    }

    #[test]
    fn passes_clean_tracing() {
        let line = r#"tracing::info!(source_id = %source.id, kind = %kind, "Upload ingested");"#;
        assert!(!LEAK_PATTERNS.iter().any(|p| line.contains(p)));
    }

    #[test]
    fn collects_multi_line_calls() {
        let source = "tracing::warn!(\n    upload_id = %id,\n    text = %page.text,\n    \"x\"\n);";
        let calls = tracing_calls(source);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.contains("page.text"));
    }

    fn scan_directory(
        root: &Path,
        dir: &Path,
        violations: &mut Vec<(String, usize, String, String)>,
    ) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                scan_directory(root, &path, violations);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                scan_file(root, &path, violations);
            }
        }
    }

    fn scan_file(root: &Path, path: &Path, violations: &mut Vec<(String, usize, String, String)>) {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if ALLOWLIST.iter().any(|a| name.contains(a)) {
            return;
        }
        let Ok(content) = fs::read_to_string(path) else {
            return;
        };
        let relative = path.strip_prefix(root).unwrap_or(path).display().to_string();

        for (line_num, call) in tracing_calls(&content) {
            for pattern in LEAK_PATTERNS {
                if call.contains(pattern) {
                    violations.push((relative.clone(), line_num, call.clone(), pattern.to_string()));
                }
            }
        }
    }

    /// Every tracing macro invocation with its 1-based start line, joined
    /// onto one line when it spans several.
    fn tracing_calls(content: &str) -> Vec<(usize, String)> {
        let lines: Vec<&str> = content.lines().collect();
        let mut calls = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].trim();
            if !TRACING_MACROS.iter().any(|m| trimmed.starts_with(m)) {
                i += 1;
                continue;
            }

            let mut call = String::from(trimmed);
            let mut depth = paren_balance(trimmed);
            let mut j = i + 1;
            while depth > 0 && j < lines.len() {
                let next = lines[j].trim();
                call.push(' ');
                call.push_str(next);
                depth += paren_balance(next);
                j += 1;
            }
            calls.push((i + 1, call));
            i = j;
        }
        calls
    }

    fn paren_balance(line: &str) -> i32 {
        line.chars().fold(0, |depth, ch| match ch {
            '(' => depth + 1,
            ')' => depth - 1,
            _ => depth,
        })
    }
}
