use super::response::ApiError;

const MAX_NAME_LEN: usize = 100;

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

/// Validate an owner or repository name: 1-100 characters drawn from
/// `[A-Za-z0-9._-]`, neither starting nor ending with a period. Enforced at
/// every ingress point; the stores treat names as opaque path segments.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name cannot be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("name cannot exceed {MAX_NAME_LEN} characters"));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(
            "name can only contain alphanumeric characters, hyphens, underscores, and periods"
                .to_string(),
        );
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err("name cannot start or end with a period".to_string());
    }
    Ok(())
}

pub fn validate_repo_id(owner: &str, name: &str) -> Result<(), ApiError> {
    validate_name(owner)
        .and_then(|()| validate_name(name))
        .map_err(ApiError::bad_request)
}
