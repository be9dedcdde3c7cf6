//! Topic name and topic filter validation
//!
//! Routing against filters is the Session's job; the codec only checks that
//! names and filters are well formed.

use crate::protocol::ProtocolError;

pub const LEVEL_SEPARATOR: char = '/';
pub const SINGLE_LEVEL_WILDCARD: char = '+';
pub const MULTI_LEVEL_WILDCARD: char = '#';

/// A topic name, as carried by PUBLISH and the CONNECT will.
///
/// Must be non-empty and must not contain wildcard characters.
pub fn validate_topic_name(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() {
        return Err(ProtocolError::TopicEmpty);
    }
    if name.contains([SINGLE_LEVEL_WILDCARD, MULTI_LEVEL_WILDCARD]) {
        return Err(ProtocolError::InvalidTopicName);
    }
    Ok(())
}

/// A topic filter, as carried by SUBSCRIBE and UNSUBSCRIBE.
///
/// `+` must occupy a whole level, `#` must occupy the whole last level.
pub fn validate_topic_filter(filter: &str) -> Result<(), ProtocolError> {
    if filter.is_empty() {
        return Err(ProtocolError::TopicEmpty);
    }

    let mut levels = filter.split(LEVEL_SEPARATOR).peekable();
    while let Some(level) = levels.next() {
        let is_last = levels.peek().is_none();
        if level.contains(MULTI_LEVEL_WILDCARD) && (level.len() != 1 || !is_last) {
            return Err(ProtocolError::InvalidTopicFilter);
        }
        if level.contains(SINGLE_LEVEL_WILDCARD) && level.len() != 1 {
            return Err(ProtocolError::InvalidTopicFilter);
        }
    }
    Ok(())
}
