//! DeepL translation provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crossrelay_traits::{ProviderError, Translator};

use super::http_client::{build_http_client, http_error};

const DEEPL_API_BASE: &str = "https://api.deepl.com";
const DEEPL_FREE_API_BASE: &str = "https://api-free.deepl.com";
const PROVIDER: &str = "DeepL";

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GlossaryResponse {
    glossary_id: String,
}

/// [`Translator`] backed by the DeepL v2 REST API.
pub struct DeepLTranslator {
    client: Client,
    api_key: String,
    api_base: String,
}

impl DeepLTranslator {
    /// Free-tier keys (suffix `:fx`) are routed to the free endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured("DeepL API key".to_string()));
        }
        let api_base = if api_key.ends_with(":fx") {
            DEEPL_FREE_API_BASE
        } else {
            DEEPL_API_BASE
        };
        Ok(Self {
            client: build_http_client()?,
            api_key,
            api_base: api_base.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn auth_header(&self) -> String {
        format!("DeepL-Auth-Key {}", self.api_key)
    }
}

/// Glossaries take bare lowercase language codes (`EN-US` -> `en`).
fn glossary_lang(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or(code)
        .to_ascii_lowercase()
}

/// Tab-separated entries; tabs and newlines inside terms are flattened.
fn entries_tsv(entries: &[(String, String)]) -> String {
    let clean = |term: &str| term.replace(['\t', '\n', '\r'], " ").trim().to_string();
    entries
        .iter()
        .map(|(source, target)| format!("{}\t{}", clean(source), clean(target)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Translator for DeepLTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
        glossary_id: Option<&str>,
    ) -> Result<String, ProviderError> {
        let mut body = json!({
            "text": [text],
            "target_lang": target_lang,
        });
        if let Some(source_lang) = source_lang {
            body["source_lang"] = json!(source_lang);
        }
        if let Some(glossary_id) = glossary_id {
            body["glossary_id"] = json!(glossary_id);
        }

        let response = self
            .client
            .post(format!("{}/v2/translate", self.api_base))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(http_error(PROVIDER, response).await);
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        parsed
            .translations
            .into_iter()
            .next()
            .map(|translation| translation.text)
            .ok_or_else(|| ProviderError::InvalidResponse("no translations returned".to_string()))
    }

    async fn create_glossary(
        &self,
        name: &str,
        source_lang: &str,
        target_lang: &str,
        entries: &[(String, String)],
    ) -> Result<String, ProviderError> {
        let body = json!({
            "name": name,
            "source_lang": glossary_lang(source_lang),
            "target_lang": glossary_lang(target_lang),
            "entries": entries_tsv(entries),
            "entries_format": "tsv",
        });

        let response = self
            .client
            .post(format!("{}/v2/glossaries", self.api_base))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(http_error(PROVIDER, response).await);
        }

        let parsed: GlossaryResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        debug!(glossary_id = %parsed.glossary_id, entries = entries.len(), "Created DeepL glossary");
        Ok(parsed.glossary_id)
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_free_key_uses_free_endpoint() {
        let free = DeepLTranslator::new("abc:fx").unwrap();
        assert_eq!(free.api_base(), "https://api-free.deepl.com");

        let pro = DeepLTranslator::new("abc").unwrap();
        assert_eq!(pro.api_base(), "https://api.deepl.com");
    }

    #[test]
    fn test_empty_key_is_not_configured() {
        assert!(matches!(
            DeepLTranslator::new("  "),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_glossary_helpers() {
        assert_eq!(glossary_lang("EN-US"), "en");
        assert_eq!(glossary_lang("es"), "es");
        let tsv = entries_tsv(&[
            ("señal".to_string(), "signal".to_string()),
            ("toma\tganancias".to_string(), "take profit".to_string()),
        ]);
        assert_eq!(tsv, "señal\tsignal\ntoma ganancias\ttake profit");
    }

    #[tokio::test]
    async fn test_translate_request_and_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .and(header("Authorization", "DeepL-Auth-Key secret"))
            .and(body_json(json!({
                "text": ["Hola mundo"],
                "target_lang": "EN",
                "source_lang": "ES",
                "glossary_id": "g-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translations": [
                    { "detected_source_language": "ES", "text": "Hello world" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let translator = DeepLTranslator::new("secret")
            .unwrap()
            .with_api_base(server.uri());
        let text = translator
            .translate("Hola mundo", Some("ES"), "EN", Some("g-1"))
            .await
            .unwrap();
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn test_quota_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(
                ResponseTemplate::new(456).set_body_json(json!({ "message": "Quota exceeded" })),
            )
            .mount(&server)
            .await;

        let translator = DeepLTranslator::new("secret")
            .unwrap()
            .with_api_base(server.uri());
        let err = translator
            .translate("Hola", None, "EN", None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::Http {
                provider: "DeepL".to_string(),
                status: 456,
                message: "Quota exceeded".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_create_glossary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/glossaries"))
            .and(body_json(json!({
                "name": "crossrelay",
                "source_lang": "es",
                "target_lang": "en",
                "entries": "señal\tsignal",
                "entries_format": "tsv"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "glossary_id": "def3a26b-3e84-45b3-84ae-0c0aaf3525f7",
                "name": "crossrelay",
                "ready": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let translator = DeepLTranslator::new("secret")
            .unwrap()
            .with_api_base(server.uri());
        let id = translator
            .create_glossary(
                "crossrelay",
                "ES",
                "EN-US",
                &[("señal".to_string(), "signal".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(id, "def3a26b-3e84-45b3-84ae-0c0aaf3525f7");
    }
}
