//! Snapshot tests for the Mistral client

#[cfg(test)]
mod snapshot_tests {
    use crate::{ChatModel, ChatRequest, Message, MistralClient, MistralConfig, ToolChoice};
    use insta::assert_yaml_snapshot;

    #[test]
    fn test_config_snapshot() {
        let config = MistralConfig {
            api_key: "test_api_key_redacted".to_string(),
            api_url: "https://api.mistral.ai".to_string(),
            timeout_secs: 60,
        };

        assert_yaml_snapshot!(config, @r###"
        api_key: test_api_key_redacted
        api_url: "https://api.mistral.ai"
        timeout_secs: 60
        "###);
    }

    #[test]
    fn test_payload_snapshot() {
        let client = MistralClient::new(MistralConfig::new("test_key"))
            .unwrap()
            .with_temperature(0.5);
        let request = ChatRequest {
            system: "Be brief.".to_string(),
            messages: vec![Message::human("Hello")],
            tools: vec![],
            tool_choice: ToolChoice::Auto,
        };

        assert_yaml_snapshot!(client.build_payload(&request), @r###"
        model: mistral-large-latest
        temperature: 0.5
        messages:
          - role: system
            content: Be brief.
          - role: user
            content: Hello
        "###);
    }

    #[test]
    fn test_model_constants() {
        let client = MistralClient::new(MistralConfig::new("k")).unwrap();
        assert_eq!(client.model_id(), MistralClient::MISTRAL_LARGE_LATEST);
        assert_yaml_snapshot!(MistralClient::MISTRAL_SMALL_LATEST, @"mistral-small-latest");
    }
}
