use crate::utils::TaxChatError;

/// What the session was doing when a collaborator failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateConversation,
    LoadConversations,
    LoadMessages,
    SendMessage,
    DeleteConversation,
    RenameConversation,
    UploadFile,
}

impl Action {
    fn fallback(self) -> &'static str {
        match self {
            Self::CreateConversation => "Failed to create conversation",
            Self::LoadConversations => "Failed to load conversations",
            Self::LoadMessages => "Failed to load messages",
            Self::SendMessage => "Failed to send message",
            Self::DeleteConversation => "Failed to delete conversation",
            Self::RenameConversation => "Failed to rename conversation",
            Self::UploadFile => "Failed to upload file",
        }
    }

    fn pace(self) -> &'static str {
        match self {
            Self::SendMessage => "sending messages",
            Self::LoadMessages => "loading messages",
            _ => "making requests",
        }
    }
}

/// Render a failure as the single line shown in the error banner
///
/// Server internals never leak: 5xx and unexpected statuses get generic
/// wording, and server-supplied text is only used for plain request failures
/// outside the message pipeline.
pub fn describe_failure(action: Action, err: &TaxChatError) -> String {
    let upload = action == Action::UploadFile;
    let message = match err {
        TaxChatError::NetworkUnavailable { timed_out: true, .. } if upload => {
            "Upload timeout. Please try again with a smaller file."
        }
        TaxChatError::NetworkUnavailable { timed_out: true, .. } => {
            "Unable to reach server. Please check your internet connection and try again."
        }
        TaxChatError::NetworkUnavailable { .. } => {
            "Network error. Please check your internet connection and try again."
        }
        TaxChatError::RateLimited => {
            return format!(
                "You're {} too quickly. Please wait a moment and try again.",
                action.pace()
            )
        }
        TaxChatError::Unauthorized(_) => "Authentication required. Please log in again.",
        TaxChatError::PermissionDenied if action == Action::LoadMessages => {
            "You don't have permission to view this conversation."
        }
        TaxChatError::PermissionDenied => "You don't have permission to perform this action.",
        TaxChatError::NotFound if upload => "Conversation not found",
        TaxChatError::NotFound => "The conversation could not be found.",
        TaxChatError::ServerFault(_) => {
            "Our servers are experiencing issues. Please try again in a moment."
        }
        TaxChatError::UploadRejected(reason) => return reason.clone(),
        TaxChatError::UploadCancelled => "Upload cancelled",
        TaxChatError::RequestFailed { message, .. } => match (action, err.status()) {
            (Action::SendMessage | Action::LoadMessages, _) => {
                "Something went wrong. Please try again."
            }
            (Action::UploadFile, Some(413)) => "File is too large",
            (Action::UploadFile, Some(415)) => "File type not supported",
            _ => return message.clone().unwrap_or_else(|| action.fallback().to_string()),
        },
        TaxChatError::InvalidResponse(_) if upload => "Invalid response from server",
        TaxChatError::InvalidResponse(_) | TaxChatError::Io(_) | TaxChatError::Config(_) => {
            action.fallback()
        }
    };
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(timed_out: bool) -> TaxChatError {
        TaxChatError::NetworkUnavailable {
            detail: "connection reset".to_string(),
            timed_out,
        }
    }

    #[test]
    fn test_message_pipeline_wording() {
        assert_eq!(
            describe_failure(Action::SendMessage, &TaxChatError::RateLimited),
            "You're sending messages too quickly. Please wait a moment and try again."
        );
        assert_eq!(
            describe_failure(Action::LoadMessages, &TaxChatError::RateLimited),
            "You're loading messages too quickly. Please wait a moment and try again."
        );
        assert_eq!(
            describe_failure(Action::LoadMessages, &TaxChatError::PermissionDenied),
            "You don't have permission to view this conversation."
        );
        assert_eq!(
            describe_failure(Action::SendMessage, &TaxChatError::PermissionDenied),
            "You don't have permission to perform this action."
        );
        assert_eq!(
            describe_failure(Action::SendMessage, &TaxChatError::NotFound),
            "The conversation could not be found."
        );
    }

    #[test]
    fn test_server_details_are_hidden() {
        assert_eq!(
            describe_failure(Action::SendMessage, &TaxChatError::ServerFault(502)),
            "Our servers are experiencing issues. Please try again in a moment."
        );

        let err = TaxChatError::from_status(400, r#"{"message": "stack trace at line 4"}"#);
        assert_eq!(
            describe_failure(Action::SendMessage, &err),
            "Something went wrong. Please try again."
        );
    }

    #[test]
    fn test_crud_uses_server_message_or_fallback() {
        let err = TaxChatError::from_status(422, r#"{"message": "Title is too long"}"#);
        assert_eq!(
            describe_failure(Action::RenameConversation, &err),
            "Title is too long"
        );

        let bare = TaxChatError::from_status(400, "");
        assert_eq!(
            describe_failure(Action::DeleteConversation, &bare),
            "Failed to delete conversation"
        );
        assert_eq!(
            describe_failure(Action::CreateConversation, &bare),
            "Failed to create conversation"
        );
    }

    #[test]
    fn test_network_wording() {
        assert_eq!(
            describe_failure(Action::SendMessage, &network(false)),
            "Network error. Please check your internet connection and try again."
        );
        assert_eq!(
            describe_failure(Action::LoadConversations, &network(true)),
            "Unable to reach server. Please check your internet connection and try again."
        );
        assert_eq!(
            describe_failure(Action::UploadFile, &network(true)),
            "Upload timeout. Please try again with a smaller file."
        );
    }

    #[test]
    fn test_upload_wording() {
        assert_eq!(
            describe_failure(Action::UploadFile, &TaxChatError::from_status(413, "")),
            "File is too large"
        );
        assert_eq!(
            describe_failure(Action::UploadFile, &TaxChatError::from_status(415, "")),
            "File type not supported"
        );
        assert_eq!(
            describe_failure(Action::UploadFile, &TaxChatError::NotFound),
            "Conversation not found"
        );
        assert_eq!(
            describe_failure(Action::UploadFile, &TaxChatError::Unauthorized(None)),
            "Authentication required. Please log in again."
        );
        assert_eq!(
            describe_failure(
                Action::UploadFile,
                &TaxChatError::UploadRejected("File is empty".to_string())
            ),
            "File is empty"
        );
        assert_eq!(
            describe_failure(Action::UploadFile, &TaxChatError::UploadCancelled),
            "Upload cancelled"
        );
    }
}
