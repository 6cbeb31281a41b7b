//! Numeric vocabularies carried on the wire.
//!
//! Each component owns one [`ComponentType`] and a closed set of message
//! types inside it. Result codes are always the first `u16` of a reply or
//! notification payload.

use std::fmt;

use crate::ProtocolError;

/// Declares a `#[repr(u16)]` enum together with `TryFrom<u16>`, `From<E>
/// for u16`, and `Display` using the variant names.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $err:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl TryFrom<u16> for $name {
            type Error = ProtocolError;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Self::$variant), )+
                    other => Err(ProtocolError::$err(other)),
                }
            }
        }

        impl From<$name> for u16 {
            fn from(value: $name) -> u16 {
                value as u16
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $( Self::$variant => stringify!($variant), )+
                };
                f.write_str(name)
            }
        }
    };
}

wire_enum! {
    /// Which component a frame is addressed to.
    ComponentType, UnknownComponent {
        /// Identity: guest names, identification, `ChatUser` records.
        User = 1,
        /// Channel membership: join, leave, roster notifications.
        Channel = 2,
    }
}

wire_enum! {
    /// Message types in the channel component's namespace.
    ///
    /// `Max` is a bounds sentinel and never a live message.
    ChannelMessageType, UnknownMessageType {
        /// Client → server join request; server → client "user joined".
        JoinChannel = 0,
        /// Server → client reply to a join request.
        JoinChannelComplete = 1,
        /// Client → server leave request; server → client "user left".
        LeaveChannel = 2,
        /// Server → client reply to a leave request.
        LeaveChannelComplete = 3,
        Max = 4,
    }
}

wire_enum! {
    /// Result and notification codes for channel messages.
    ChannelResult, UnknownResult {
        Ok = 0,
        /// The join created the channel; the joiner is its operator.
        ChannelCreated = 1,
        /// Broadcast: someone joined a channel you are in.
        UserJoined = 2,
        /// Broadcast: someone left (or disconnected from) a channel you are in.
        UserLeft = 3,
        NotIdentified = 4,
        /// The name lacks `#`, or (on leave) no such channel exists.
        InvalidChannelName = 5,
        AlreadyInChannel = 6,
        NotInChannel = 7,
    }
}

wire_enum! {
    /// Message types in the user component's namespace.
    UserMessageType, UnknownMessageType {
        /// Client → server: claim a username with credentials.
        Identify = 0,
        /// Server → client reply to `Identify`.
        IdentifyComplete = 1,
        Max = 2,
    }
}

wire_enum! {
    /// Result codes for user messages.
    UserResult, UnknownResult {
        Ok = 0,
        InvalidUsername = 1,
        UsernameTaken = 2,
        AlreadyIdentified = 3,
        AuthFailed = 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type_codes() {
        assert_eq!(u16::from(ComponentType::User), 1);
        assert_eq!(ComponentType::try_from(2), Ok(ComponentType::Channel));
        assert_eq!(
            ComponentType::try_from(9),
            Err(ProtocolError::UnknownComponent(9))
        );
    }

    #[test]
    fn test_channel_message_type_namespace_is_closed() {
        assert_eq!(
            ChannelMessageType::try_from(0),
            Ok(ChannelMessageType::JoinChannel)
        );
        assert_eq!(
            ChannelMessageType::try_from(3),
            Ok(ChannelMessageType::LeaveChannelComplete)
        );
        assert_eq!(ChannelMessageType::try_from(4), Ok(ChannelMessageType::Max));
        assert_eq!(
            ChannelMessageType::try_from(5),
            Err(ProtocolError::UnknownMessageType(5))
        );
    }

    #[test]
    fn test_channel_result_codes_are_distinct_and_stable() {
        let all = [
            ChannelResult::Ok,
            ChannelResult::ChannelCreated,
            ChannelResult::UserJoined,
            ChannelResult::UserLeft,
            ChannelResult::NotIdentified,
            ChannelResult::InvalidChannelName,
            ChannelResult::AlreadyInChannel,
            ChannelResult::NotInChannel,
        ];
        for (code, result) in all.iter().enumerate() {
            assert_eq!(u16::from(*result), code as u16);
            assert_eq!(ChannelResult::try_from(code as u16), Ok(*result));
        }
        assert!(ChannelResult::try_from(8).is_err());
    }

    #[test]
    fn test_display_uses_variant_name() {
        assert_eq!(ChannelResult::NotInChannel.to_string(), "NotInChannel");
        assert_eq!(UserMessageType::Identify.to_string(), "Identify");
    }
}
