//! Topic name expansion and validation.
//!
//! Consumed by subscription init as a black box: a local name is expanded
//! against the node's name and namespace, substitution tokens are resolved,
//! and the fully qualified result is validated. The rules here are the
//! naming contract only; nothing in this module talks to the transport.

use crate::error::{Result, SubscriptionError};

/// Expand a possibly-relative topic name to a fully qualified one.
///
/// - Absolute names (`/sensors/imu`) are validated as-is.
/// - `~` and `~/rest` resolve under the node's private namespace.
/// - Relative names resolve under the node's namespace.
/// - `{node}` and `{namespace}` substitution tokens are replaced before
///   expansion; any other `{token}` is rejected.
pub fn expand_topic_name(local_name: &str, node_name: &str, namespace: &str) -> Result<String> {
    if local_name.is_empty() {
        return Err(SubscriptionError::TopicNameInvalid(
            "topic name is empty".to_string(),
        ));
    }

    let substituted = substitute_tokens(local_name, node_name, namespace)?;

    let expanded = if let Some(rest) = substituted.strip_prefix("~") {
        let private_base = join(namespace, node_name);
        if rest.is_empty() {
            private_base
        } else if let Some(tail) = rest.strip_prefix('/') {
            join(&private_base, tail)
        } else {
            return Err(SubscriptionError::TopicNameInvalid(format!(
                "'~' must be followed by '/' in '{}'",
                local_name
            )));
        }
    } else if substituted.starts_with('/') {
        substituted
    } else {
        join(namespace, &substituted)
    };

    validate_full_name(&expanded)?;
    Ok(expanded)
}

/// Replace `{node}` and `{namespace}` tokens. Unknown tokens are invalid.
fn substitute_tokens(name: &str, node_name: &str, namespace: &str) -> Result<String> {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            SubscriptionError::TopicNameInvalid(format!("unterminated '{{' in '{}'", name))
        })?;
        let token = &after[..close];
        match token {
            "node" => out.push_str(node_name),
            "namespace" => out.push_str(namespace.trim_start_matches('/')),
            other => {
                return Err(SubscriptionError::TopicNameInvalid(format!(
                    "unknown substitution '{{{}}}' in '{}'",
                    other, name
                )));
            }
        }
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(SubscriptionError::TopicNameInvalid(format!(
            "unmatched '}}' in '{}'",
            name
        )));
    }
    out.push_str(rest);
    Ok(out)
}

fn join(base: &str, tail: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        format!("/{}", tail)
    } else {
        format!("{}/{}", base, tail)
    }
}

/// Validate a fully qualified topic name.
fn validate_full_name(name: &str) -> Result<()> {
    if !name.starts_with('/') {
        return Err(SubscriptionError::TopicNameInvalid(format!(
            "'{}' is not fully qualified",
            name
        )));
    }
    if name.len() > 1 && name.ends_with('/') {
        return Err(SubscriptionError::TopicNameInvalid(format!(
            "'{}' ends with '/'",
            name
        )));
    }
    if name.contains("//") {
        return Err(SubscriptionError::TopicNameInvalid(format!(
            "'{}' contains a repeated '/'",
            name
        )));
    }
    for ch in name.chars() {
        if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '/') {
            return Err(SubscriptionError::TopicNameInvalid(format!(
                "'{}' contains illegal character '{}'",
                name, ch
            )));
        }
    }
    // Each segment must not start with a digit.
    for segment in name.split('/').skip(1) {
        if segment
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
        {
            return Err(SubscriptionError::TopicNameInvalid(format!(
                "segment '{}' starts with a digit",
                segment
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_name_in_root_namespace() {
        let name = expand_topic_name("chatter", "talker", "/").unwrap();
        assert_eq!(name, "/chatter");
    }

    #[test]
    fn test_relative_name_in_namespace() {
        let name = expand_topic_name("chatter", "talker", "/ns").unwrap();
        assert_eq!(name, "/ns/chatter");
    }

    #[test]
    fn test_absolute_name_unchanged() {
        let name = expand_topic_name("/other/chatter", "talker", "/ns").unwrap();
        assert_eq!(name, "/other/chatter");
    }

    #[test]
    fn test_private_name() {
        let name = expand_topic_name("~/status", "talker", "/ns").unwrap();
        assert_eq!(name, "/ns/talker/status");

        let name = expand_topic_name("~", "talker", "/").unwrap();
        assert_eq!(name, "/talker");
    }

    #[test]
    fn test_node_substitution() {
        let name = expand_topic_name("{node}/events", "talker", "/").unwrap();
        assert_eq!(name, "/talker/events");
    }

    #[test]
    fn test_spaced_name_rejected() {
        let err = expand_topic_name("spaced name", "talker", "/").unwrap_err();
        assert!(matches!(err, SubscriptionError::TopicNameInvalid(_)));
    }

    #[test]
    fn test_unknown_token_rejected() {
        let err = expand_topic_name("sub{not_a_token}", "talker", "/").unwrap_err();
        assert!(matches!(err, SubscriptionError::TopicNameInvalid(_)));
    }

    #[test]
    fn test_unterminated_token_rejected() {
        let err = expand_topic_name("sub{oops", "talker", "/").unwrap_err();
        assert!(matches!(err, SubscriptionError::TopicNameInvalid(_)));
        let err = expand_topic_name("oops}sub", "talker", "/").unwrap_err();
        assert!(matches!(err, SubscriptionError::TopicNameInvalid(_)));
    }

    #[test]
    fn test_digit_leading_segment_rejected() {
        let err = expand_topic_name("/9lives", "talker", "/").unwrap_err();
        assert!(matches!(err, SubscriptionError::TopicNameInvalid(_)));
    }

    #[test]
    fn test_repeated_slash_rejected() {
        let err = expand_topic_name("/a//b", "talker", "/").unwrap_err();
        assert!(matches!(err, SubscriptionError::TopicNameInvalid(_)));
    }
}
