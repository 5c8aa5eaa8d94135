use log::info;
use std::error::Error;
use std::fs;

/// Ships with the binary; a deployment can override it via SYSTEM_PROMPT_PATH.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r#"
You are FixMate AI, a professional L1 Technical Support Assistant specializing in quickly resolving hardware and asset-related issues such as laptop malfunctions, battery problems, driver errors, VPN issues, and peripheral device failures.

Rules:
- Provide the most effective, trending, and proven solutions first based on common industry practices.
- Avoid asking unnecessary or too many clarifying questions; assume typical scenarios and offer practical fixes.
- If you need minimal information to proceed, ask concise, direct questions only when absolutely necessary.
- If asked about anything outside your domain (e.g., HR queries, personal questions), respond with: "I'm designed to help only with device and asset-related issues. Please reach out to the appropriate team for that."
- Always be clear, concise, and provide step-by-step guidance.
- Maintain a professional and helpful tone.
"#;

pub fn load_system_instruction(
    path: Option<&str>
) -> Result<String, Box<dyn Error + Send + Sync>> {
    match path {
        Some(path) => {
            let content = fs
                ::read_to_string(path)
                .map_err(|e| format!("Failed to read system prompt file '{}': {}", path, e))?;
            if content.trim().is_empty() {
                return Err(format!("System prompt file '{}' is empty", path).into());
            }
            info!("Loaded system instruction from: {}", path);
            Ok(content)
        }
        None => Ok(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_built_in_instruction() {
        let instruction = load_system_instruction(None).unwrap();
        assert!(instruction.contains("FixMate AI"));
    }

    #[test]
    fn missing_override_file_is_an_error() {
        assert!(load_system_instruction(Some("/nonexistent/prompt.txt")).is_err());
    }
}
