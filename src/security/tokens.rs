/// Random bytes in a generated gateway token (48 hex chars).
const GATEWAY_TOKEN_BYTES: usize = 24;

/// Generate a fresh gateway bearer token from the OS CSPRNG.
pub fn generate_gateway_token() -> String {
    let bytes: [u8; GATEWAY_TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Normalize a pasted API key.
///
/// Accepts shell-style input such as `export OPENAI_API_KEY="sk-..."`, strips
/// one pair of wrapping quotes and a trailing `;`. Returns an empty string
/// when nothing usable remains.
pub fn normalize_api_key_input(raw: &str) -> String {
    let trimmed = raw.trim();
    let value = strip_env_assignment(trimmed).unwrap_or(trimmed);
    let value = strip_wrapping_quotes(value.trim());
    let value = value.strip_suffix(';').unwrap_or(value);
    strip_wrapping_quotes(value.trim()).trim().to_string()
}

/// Normalize a gateway token flag. Literal `undefined`/`null` from shell
/// templating count as absent.
pub fn normalize_token_input(raw: &str) -> Option<String> {
    let value = strip_wrapping_quotes(raw.trim()).trim();
    if value.is_empty() || value == "undefined" || value == "null" {
        return None;
    }
    Some(value.to_string())
}

fn strip_wrapping_quotes(value: &str) -> &str {
    for quote in ['"', '\'', '`'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// `[export ]NAME=value` → `value`, where NAME looks like an env var
/// (uppercase, digits, underscores). Base64 padding in bare keys is left alone.
fn strip_env_assignment(value: &str) -> Option<&str> {
    let rest = value
        .strip_prefix("export")
        .filter(|r| r.starts_with(char::is_whitespace))
        .map_or(value, str::trim_start);
    let (name, assigned) = rest.split_once('=')?;
    let name = name.trim_end();
    let mut chars = name.chars();
    let first = chars.next()?;
    let valid_name = (first.is_ascii_uppercase() || first == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    (valid_name && !assigned.trim().is_empty()).then_some(assigned)
}
