use nglbot::observability::{OperatorNotifier, Severity};
use teloxide::prelude::*;
use teloxide::types::Recipient;
use url::Url;

/// `@name` handles go by username, anything numeric is a chat id.
pub fn channel_recipient(channel: &str) -> Recipient {
    match channel.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(channel.to_string()),
    }
}

/// Private channels have no public link.
pub fn channel_url(channel: &str) -> Option<Url> {
    let name = channel.strip_prefix('@')?;
    Url::parse(&format!("https://t.me/{}", name)).ok()
}

/// Channels from `channels` the user has not joined. A failed lookup counts as not joined.
pub async fn missing_channels(
    bot: &Bot,
    notifier: &dyn OperatorNotifier,
    channels: &[String],
    user_id: i64,
) -> Vec<String> {
    let mut missing = Vec::new();

    for channel in channels {
        match bot
            .get_chat_member(channel_recipient(channel), UserId(user_id as u64))
            .await
        {
            Ok(member) if member.kind.is_present() => {}
            Ok(_) => missing.push(channel.clone()),
            Err(e) => {
                tracing::warn!("Membership check in {} failed for {}: {}", channel, user_id, e);
                notifier
                    .alert(
                        Severity::Warning,
                        "Membership",
                        &format!("Cannot check membership in {}: {}", channel, e),
                    )
                    .await;
                missing.push(channel.clone());
            }
        }
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_recipient() {
        assert!(matches!(
            channel_recipient("-1001234"),
            Recipient::Id(ChatId(-1001234))
        ));
        assert!(matches!(
            channel_recipient("@news"),
            Recipient::ChannelUsername(ref name) if name == "@news"
        ));
    }

    #[test]
    fn test_channel_url() {
        assert_eq!(
            channel_url("@news").map(|u| u.to_string()),
            Some("https://t.me/news".to_string())
        );
        assert!(channel_url("-1001234").is_none());
    }
}
