//! # Federated Identity Provider Configuration
//!
//! OIDC and SAML provider configs of a project (or tenant), managed through
//! the v2 `oauthIdpConfigs` and `inboundSamlConfigs` resources. The two kinds
//! share the `{provider id, display name, enabled}` base but are distinct
//! types with distinct create/update requests.
//!
//! PATCH requests carry an `updateMask` computed from exactly the fields that
//! were set, in declaration order, descending into the nested `idpConfig` and
//! `spConfig` objects.

use serde::{Deserialize, Serialize};

use super::pages::{validate_page_token, Page};
use super::ApiClient;
use crate::errors::{FirebaseError, Result};

pub(crate) const MAX_LIST_PROVIDER_CONFIGS: u32 = 100;

fn validate_oidc_provider_id(provider_id: &str) -> Result<()> {
    if !provider_id.starts_with("oidc.") || provider_id.len() == "oidc.".len() {
        return Err(FirebaseError::invalid_argument(format!(
            "OIDC provider ids must be prefixed with 'oidc.', got '{}'",
            provider_id
        )));
    }
    Ok(())
}

fn validate_saml_provider_id(provider_id: &str) -> Result<()> {
    if !provider_id.starts_with("saml.") || provider_id.len() == "saml.".len() {
        return Err(FirebaseError::invalid_argument(format!(
            "SAML provider ids must be prefixed with 'saml.', got '{}'",
            provider_id
        )));
    }
    Ok(())
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    reqwest::Url::parse(url)
        .map_err(|e| {
            FirebaseError::invalid_argument(format!("{} '{}' is not an absolute URL", field, url))
                .with_source(e)
        })
        .map(|_| ())
}

/// Resource names look like `projects/<p>/oauthIdpConfigs/<id>`; the last
/// segment is the provider id.
fn provider_id_from_name(name: &str) -> String {
    name.rsplit('/').next().unwrap_or_default().to_owned()
}

// ---------------------------------------------------------------------------
// OIDC

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct OidcConfigDTO {
    name: String,
    display_name: Option<String>,
    enabled: bool,
    client_id: String,
    issuer: String,
}

/// An OIDC provider registered with the project.
#[derive(Debug, Clone)]
pub struct OidcProviderConfig {
    pub provider_id: String,
    pub display_name: Option<String>,
    pub enabled: bool,
    pub client_id: String,
    pub issuer: String,
}

impl OidcProviderConfig {
    fn from_dto(dto: OidcConfigDTO) -> Self {
        OidcProviderConfig {
            provider_id: provider_id_from_name(&dto.name),
            display_name: dto.display_name,
            enabled: dto.enabled,
            client_id: dto.client_id,
            issuer: dto.issuer,
        }
    }
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct OidcConfigBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer: Option<String>,
}

/// Parameters for registering a new OIDC provider.
#[derive(Debug, Default, Clone)]
pub struct OidcProviderCreateRequest {
    provider_id: String,
    display_name: Option<String>,
    enabled: Option<bool>,
    client_id: Option<String>,
    issuer: Option<String>,
}

impl OidcProviderCreateRequest {
    pub fn new(provider_id: impl Into<String>) -> Self {
        OidcProviderCreateRequest {
            provider_id: provider_id.into(),
            ..OidcProviderCreateRequest::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    fn into_body(self) -> Result<(String, OidcConfigBody)> {
        validate_oidc_provider_id(&self.provider_id)?;
        let client_id = match self.client_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(FirebaseError::invalid_argument("OIDC providers require a client id")),
        };
        let issuer = match self.issuer {
            Some(issuer) => {
                validate_url("issuer", &issuer)?;
                issuer
            }
            None => return Err(FirebaseError::invalid_argument("OIDC providers require an issuer")),
        };
        Ok((
            self.provider_id,
            OidcConfigBody {
                display_name: self.display_name,
                enabled: self.enabled,
                client_id: Some(client_id),
                issuer: Some(issuer),
            },
        ))
    }
}

/// Partial update of an OIDC provider. Only fields that were set are patched.
#[derive(Debug, Default, Clone)]
pub struct OidcProviderUpdateRequest {
    provider_id: String,
    display_name: Option<String>,
    enabled: Option<bool>,
    client_id: Option<String>,
    issuer: Option<String>,
}

impl OidcProviderUpdateRequest {
    pub fn new(provider_id: impl Into<String>) -> Self {
        OidcProviderUpdateRequest {
            provider_id: provider_id.into(),
            ..OidcProviderUpdateRequest::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Dotted field paths of the set properties, in declaration order.
    pub(crate) fn update_mask(&self) -> Vec<String> {
        let mut mask = Vec::new();
        if self.display_name.is_some() {
            mask.push("displayName".to_owned());
        }
        if self.enabled.is_some() {
            mask.push("enabled".to_owned());
        }
        if self.client_id.is_some() {
            mask.push("clientId".to_owned());
        }
        if self.issuer.is_some() {
            mask.push("issuer".to_owned());
        }
        mask
    }

    fn into_parts(self) -> Result<(String, Vec<String>, OidcConfigBody)> {
        validate_oidc_provider_id(&self.provider_id)?;
        let mask = self.update_mask();
        if mask.is_empty() {
            return Err(FirebaseError::invalid_argument("update request changes nothing"));
        }
        if let Some(ref issuer) = self.issuer {
            validate_url("issuer", issuer)?;
        }
        if self.client_id.as_deref() == Some("") {
            return Err(FirebaseError::invalid_argument("client id must not be empty"));
        }
        Ok((
            self.provider_id,
            mask,
            OidcConfigBody {
                display_name: self.display_name,
                enabled: self.enabled,
                client_id: self.client_id,
                issuer: self.issuer,
            },
        ))
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct OidcListResponse {
    oauth_idp_configs: Option<Vec<OidcConfigDTO>>,
    next_page_token: Option<String>,
}

// ---------------------------------------------------------------------------
// SAML

#[derive(Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
struct IdpCertificateDTO {
    x509_certificate: String,
}

#[derive(Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
struct IdpConfigDTO {
    #[serde(skip_serializing_if = "Option::is_none")]
    idp_entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sso_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    idp_certificates: Option<Vec<IdpCertificateDTO>>,
}

#[derive(Serialize, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
struct SpConfigDTO {
    #[serde(skip_serializing_if = "Option::is_none")]
    sp_entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_uri: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SamlConfigDTO {
    name: String,
    display_name: Option<String>,
    enabled: bool,
    idp_config: IdpConfigDTO,
    sp_config: SpConfigDTO,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct SamlConfigBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    idp_config: Option<IdpConfigDTO>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sp_config: Option<SpConfigDTO>,
}

/// A SAML provider registered with the project.
#[derive(Debug, Clone)]
pub struct SamlProviderConfig {
    pub provider_id: String,
    pub display_name: Option<String>,
    pub enabled: bool,
    pub idp_entity_id: Option<String>,
    pub sso_url: Option<String>,
    pub x509_certificates: Vec<String>,
    pub rp_entity_id: Option<String>,
    pub callback_url: Option<String>,
}

impl SamlProviderConfig {
    fn from_dto(dto: SamlConfigDTO) -> Self {
        SamlProviderConfig {
            provider_id: provider_id_from_name(&dto.name),
            display_name: dto.display_name,
            enabled: dto.enabled,
            idp_entity_id: dto.idp_config.idp_entity_id,
            sso_url: dto.idp_config.sso_url,
            x509_certificates: dto
                .idp_config
                .idp_certificates
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.x509_certificate)
                .collect(),
            rp_entity_id: dto.sp_config.sp_entity_id,
            callback_url: dto.sp_config.callback_uri,
        }
    }
}

/// Parameters for registering a new SAML provider.
#[derive(Debug, Default, Clone)]
pub struct SamlProviderCreateRequest {
    provider_id: String,
    display_name: Option<String>,
    enabled: Option<bool>,
    idp_entity_id: Option<String>,
    sso_url: Option<String>,
    x509_certificates: Vec<String>,
    rp_entity_id: Option<String>,
    callback_url: Option<String>,
}

impl SamlProviderCreateRequest {
    pub fn new(provider_id: impl Into<String>) -> Self {
        SamlProviderCreateRequest {
            provider_id: provider_id.into(),
            ..SamlProviderCreateRequest::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_idp_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.idp_entity_id = Some(entity_id.into());
        self
    }

    pub fn with_sso_url(mut self, url: impl Into<String>) -> Self {
        self.sso_url = Some(url.into());
        self
    }

    pub fn with_x509_certificates(mut self, certificates: Vec<String>) -> Self {
        self.x509_certificates = certificates;
        self
    }

    pub fn with_rp_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.rp_entity_id = Some(entity_id.into());
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    fn into_body(self) -> Result<(String, SamlConfigBody)> {
        validate_saml_provider_id(&self.provider_id)?;
        let idp_entity_id = self
            .idp_entity_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| FirebaseError::invalid_argument("SAML providers require an IdP entity id"))?;
        let sso_url = self
            .sso_url
            .ok_or_else(|| FirebaseError::invalid_argument("SAML providers require an SSO URL"))?;
        validate_url("SSO URL", &sso_url)?;
        if self.x509_certificates.is_empty() {
            return Err(FirebaseError::invalid_argument(
                "SAML providers require at least one X.509 certificate",
            ));
        }
        let rp_entity_id = self
            .rp_entity_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| FirebaseError::invalid_argument("SAML providers require an RP entity id"))?;
        let callback_url = self
            .callback_url
            .ok_or_else(|| FirebaseError::invalid_argument("SAML providers require a callback URL"))?;
        validate_url("callback URL", &callback_url)?;

        Ok((
            self.provider_id,
            SamlConfigBody {
                display_name: self.display_name,
                enabled: self.enabled,
                idp_config: Some(IdpConfigDTO {
                    idp_entity_id: Some(idp_entity_id),
                    sso_url: Some(sso_url),
                    idp_certificates: Some(
                        self.x509_certificates
                            .into_iter()
                            .map(|x509_certificate| IdpCertificateDTO { x509_certificate })
                            .collect(),
                    ),
                }),
                sp_config: Some(SpConfigDTO {
                    sp_entity_id: Some(rp_entity_id),
                    callback_uri: Some(callback_url),
                }),
            },
        ))
    }
}

/// Partial update of a SAML provider. Only fields that were set are patched.
#[derive(Debug, Default, Clone)]
pub struct SamlProviderUpdateRequest {
    provider_id: String,
    display_name: Option<String>,
    enabled: Option<bool>,
    idp_entity_id: Option<String>,
    sso_url: Option<String>,
    x509_certificates: Option<Vec<String>>,
    rp_entity_id: Option<String>,
    callback_url: Option<String>,
}

impl SamlProviderUpdateRequest {
    pub fn new(provider_id: impl Into<String>) -> Self {
        SamlProviderUpdateRequest {
            provider_id: provider_id.into(),
            ..SamlProviderUpdateRequest::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_idp_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.idp_entity_id = Some(entity_id.into());
        self
    }

    pub fn with_sso_url(mut self, url: impl Into<String>) -> Self {
        self.sso_url = Some(url.into());
        self
    }

    pub fn with_x509_certificates(mut self, certificates: Vec<String>) -> Self {
        self.x509_certificates = Some(certificates);
        self
    }

    pub fn with_rp_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.rp_entity_id = Some(entity_id.into());
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    /// Dotted field paths of the set properties, in declaration order,
    /// descending into the nested config objects.
    pub(crate) fn update_mask(&self) -> Vec<String> {
        let mut mask = Vec::new();
        if self.display_name.is_some() {
            mask.push("displayName".to_owned());
        }
        if self.enabled.is_some() {
            mask.push("enabled".to_owned());
        }
        if self.idp_entity_id.is_some() {
            mask.push("idpConfig.idpEntityId".to_owned());
        }
        if self.sso_url.is_some() {
            mask.push("idpConfig.ssoUrl".to_owned());
        }
        if self.x509_certificates.is_some() {
            mask.push("idpConfig.idpCertificates".to_owned());
        }
        if self.rp_entity_id.is_some() {
            mask.push("spConfig.spEntityId".to_owned());
        }
        if self.callback_url.is_some() {
            mask.push("spConfig.callbackUri".to_owned());
        }
        mask
    }

    fn into_parts(self) -> Result<(String, Vec<String>, SamlConfigBody)> {
        validate_saml_provider_id(&self.provider_id)?;
        let mask = self.update_mask();
        if mask.is_empty() {
            return Err(FirebaseError::invalid_argument("update request changes nothing"));
        }
        if let Some(ref url) = self.sso_url {
            validate_url("SSO URL", url)?;
        }
        if let Some(ref url) = self.callback_url {
            validate_url("callback URL", url)?;
        }
        if matches!(self.x509_certificates, Some(ref certs) if certs.is_empty()) {
            return Err(FirebaseError::invalid_argument(
                "the certificate list of a SAML provider must not be emptied",
            ));
        }

        let idp_changed =
            self.idp_entity_id.is_some() || self.sso_url.is_some() || self.x509_certificates.is_some();
        let sp_changed = self.rp_entity_id.is_some() || self.callback_url.is_some();

        Ok((
            self.provider_id,
            mask,
            SamlConfigBody {
                display_name: self.display_name,
                enabled: self.enabled,
                idp_config: idp_changed.then(|| IdpConfigDTO {
                    idp_entity_id: self.idp_entity_id,
                    sso_url: self.sso_url,
                    idp_certificates: self.x509_certificates.map(|certs| {
                        certs
                            .into_iter()
                            .map(|x509_certificate| IdpCertificateDTO { x509_certificate })
                            .collect()
                    }),
                }),
                sp_config: sp_changed.then(|| SpConfigDTO {
                    sp_entity_id: self.rp_entity_id,
                    callback_uri: self.callback_url,
                }),
            },
        ))
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SamlListResponse {
    inbound_saml_configs: Option<Vec<SamlConfigDTO>>,
    next_page_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Operations

fn validate_page_size(page_size: u32) -> Result<()> {
    if page_size == 0 || page_size > MAX_LIST_PROVIDER_CONFIGS {
        return Err(FirebaseError::invalid_argument(format!(
            "page size must be between 1 and {}",
            MAX_LIST_PROVIDER_CONFIGS
        )));
    }
    Ok(())
}

/// Provider-config operations of one (optionally tenant-scoped) project.
pub(crate) struct ProviderConfigManager {
    client: ApiClient,
}

impl ProviderConfigManager {
    pub(crate) fn new(client: ApiClient) -> Self {
        ProviderConfigManager { client }
    }

    pub(crate) fn create_oidc(&self, request: OidcProviderCreateRequest) -> Result<OidcProviderConfig> {
        let (provider_id, body) = request.into_body()?;
        let url = self.client.v2("/oauthIdpConfigs");
        let dto: OidcConfigDTO = self.client.post_json_with_query(
            &url,
            &[("oauthIdpConfigId", provider_id)],
            &body,
            "create OIDC provider config",
        )?;
        Ok(OidcProviderConfig::from_dto(dto))
    }

    pub(crate) fn get_oidc(&self, provider_id: &str) -> Result<OidcProviderConfig> {
        validate_oidc_provider_id(provider_id)?;
        let url = self.client.v2(&format!("/oauthIdpConfigs/{}", provider_id));
        let dto: OidcConfigDTO = self.client.get_json(&url, &[], "get OIDC provider config")?;
        Ok(OidcProviderConfig::from_dto(dto))
    }

    pub(crate) fn update_oidc(&self, request: OidcProviderUpdateRequest) -> Result<OidcProviderConfig> {
        let (provider_id, mask, body) = request.into_parts()?;
        let url = self.client.v2(&format!("/oauthIdpConfigs/{}", provider_id));
        let dto: OidcConfigDTO = self.client.patch_json(
            &url,
            &[("updateMask", mask.join(","))],
            &body,
            "update OIDC provider config",
        )?;
        Ok(OidcProviderConfig::from_dto(dto))
    }

    pub(crate) fn delete_oidc(&self, provider_id: &str) -> Result<()> {
        validate_oidc_provider_id(provider_id)?;
        let url = self.client.v2(&format!("/oauthIdpConfigs/{}", provider_id));
        self.client.delete(&url, "delete OIDC provider config")
    }

    pub(crate) fn list_oidc(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<OidcProviderConfig>> {
        validate_page_token(page_token)?;
        validate_page_size(page_size)?;
        let mut query = vec![("pageSize", page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_owned()));
        }
        let response: OidcListResponse = self.client.get_json(
            &self.client.v2("/oauthIdpConfigs"),
            &query,
            "list OIDC provider configs",
        )?;
        Ok(Page::new(
            response
                .oauth_idp_configs
                .unwrap_or_default()
                .into_iter()
                .map(OidcProviderConfig::from_dto)
                .collect(),
            response.next_page_token,
        ))
    }

    pub(crate) fn create_saml(&self, request: SamlProviderCreateRequest) -> Result<SamlProviderConfig> {
        let (provider_id, body) = request.into_body()?;
        let url = self.client.v2("/inboundSamlConfigs");
        let dto: SamlConfigDTO = self.client.post_json_with_query(
            &url,
            &[("inboundSamlConfigId", provider_id)],
            &body,
            "create SAML provider config",
        )?;
        Ok(SamlProviderConfig::from_dto(dto))
    }

    pub(crate) fn get_saml(&self, provider_id: &str) -> Result<SamlProviderConfig> {
        validate_saml_provider_id(provider_id)?;
        let url = self.client.v2(&format!("/inboundSamlConfigs/{}", provider_id));
        let dto: SamlConfigDTO = self.client.get_json(&url, &[], "get SAML provider config")?;
        Ok(SamlProviderConfig::from_dto(dto))
    }

    pub(crate) fn update_saml(&self, request: SamlProviderUpdateRequest) -> Result<SamlProviderConfig> {
        let (provider_id, mask, body) = request.into_parts()?;
        let url = self.client.v2(&format!("/inboundSamlConfigs/{}", provider_id));
        let dto: SamlConfigDTO = self.client.patch_json(
            &url,
            &[("updateMask", mask.join(","))],
            &body,
            "update SAML provider config",
        )?;
        Ok(SamlProviderConfig::from_dto(dto))
    }

    pub(crate) fn delete_saml(&self, provider_id: &str) -> Result<()> {
        validate_saml_provider_id(provider_id)?;
        let url = self.client.v2(&format!("/inboundSamlConfigs/{}", provider_id));
        self.client.delete(&url, "delete SAML provider config")
    }

    pub(crate) fn list_saml(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<SamlProviderConfig>> {
        validate_page_token(page_token)?;
        validate_page_size(page_size)?;
        let mut query = vec![("pageSize", page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_owned()));
        }
        let response: SamlListResponse = self.client.get_json(
            &self.client.v2("/inboundSamlConfigs"),
            &query,
            "list SAML provider configs",
        )?;
        Ok(Page::new(
            response
                .inbound_saml_configs
                .unwrap_or_default()
                .into_iter()
                .map(SamlProviderConfig::from_dto)
                .collect(),
            response.next_page_token,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AuthErrorCode;
    use crate::oauth::EmulatorTokenSource;
    use serde_json::json;
    use std::sync::Arc;

    fn manager() -> ProviderConfigManager {
        ProviderConfigManager::new(ApiClient::new(
            reqwest::blocking::Client::new(),
            Arc::new(EmulatorTokenSource),
            "demo-project",
            None,
            None,
            None,
        ))
    }

    #[test]
    fn provider_id_prefixes_are_enforced() {
        assert!(validate_oidc_provider_id("oidc.x").is_ok());
        assert!(validate_oidc_provider_id("saml.x").is_err());
        assert!(validate_oidc_provider_id("oidc.").is_err());
        assert!(validate_saml_provider_id("saml.x").is_ok());
        assert!(validate_saml_provider_id("oidc.x").is_err());
    }

    #[test]
    fn oidc_create_requires_client_id_and_issuer() {
        let request = OidcProviderCreateRequest::new("oidc.x").with_client_id("client");
        assert!(request.into_body().is_err());

        let request = OidcProviderCreateRequest::new("oidc.x")
            .with_client_id("client")
            .with_issuer("not a url");
        assert!(request.into_body().is_err());

        let (id, body) = OidcProviderCreateRequest::new("oidc.x")
            .with_client_id("client")
            .with_issuer("https://issuer.example.com")
            .with_enabled(true)
            .into_body()
            .unwrap();
        assert_eq!(id, "oidc.x");
        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["clientId"], json!("client"));
        assert_eq!(wire["enabled"], json!(true));
    }

    #[test]
    fn oidc_mask_follows_declaration_order() {
        let request = OidcProviderUpdateRequest::new("oidc.x")
            .with_issuer("https://issuer.example.com")
            .with_display_name("Example")
            .with_client_id("client");
        assert_eq!(request.update_mask(), ["displayName", "clientId", "issuer"]);
    }

    #[test]
    fn mask_is_deterministic_for_identical_requests() {
        let make = || {
            SamlProviderUpdateRequest::new("saml.x")
                .with_callback_url("https://example.com/cb")
                .with_enabled(false)
                .update_mask()
        };
        assert_eq!(make(), make());
        assert_eq!(make(), ["enabled", "spConfig.callbackUri"]);
    }

    #[test]
    fn saml_mask_descends_into_nested_objects() {
        let request = SamlProviderUpdateRequest::new("saml.x")
            .with_display_name("Example")
            .with_idp_entity_id("idp")
            .with_sso_url("https://sso.example.com")
            .with_x509_certificates(vec!["CERT".to_owned()])
            .with_rp_entity_id("rp")
            .with_callback_url("https://example.com/cb");
        assert_eq!(
            request.update_mask(),
            [
                "displayName",
                "idpConfig.idpEntityId",
                "idpConfig.ssoUrl",
                "idpConfig.idpCertificates",
                "spConfig.spEntityId",
                "spConfig.callbackUri",
            ]
        );
    }

    #[test]
    fn empty_update_is_rejected() {
        assert!(OidcProviderUpdateRequest::new("oidc.x").into_parts().is_err());
        assert!(SamlProviderUpdateRequest::new("saml.x").into_parts().is_err());
    }

    #[test]
    fn saml_create_validates_every_required_field() {
        let full = || {
            SamlProviderCreateRequest::new("saml.x")
                .with_idp_entity_id("idp")
                .with_sso_url("https://sso.example.com")
                .with_x509_certificates(vec!["CERT".to_owned()])
                .with_rp_entity_id("rp")
                .with_callback_url("https://example.com/cb")
        };
        assert!(full().into_body().is_ok());
        assert!(SamlProviderCreateRequest::new("oidc.x").into_body().is_err());
        assert!(full().with_x509_certificates(vec![]).into_body().is_err());
        assert!(full().with_sso_url("nope").into_body().is_err());
    }

    #[test]
    fn saml_update_body_contains_only_touched_subobjects() {
        let (_, _, body) = SamlProviderUpdateRequest::new("saml.x")
            .with_enabled(true)
            .into_parts()
            .unwrap();
        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["enabled"], json!(true));
        assert!(wire.get("idpConfig").is_none());
        assert!(wire.get("spConfig").is_none());

        let (_, _, body) = SamlProviderUpdateRequest::new("saml.x")
            .with_sso_url("https://sso.example.com")
            .into_parts()
            .unwrap();
        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["idpConfig"]["ssoUrl"], json!("https://sso.example.com"));
        assert!(wire.get("spConfig").is_none());
    }

    #[test]
    fn resource_names_yield_provider_ids() {
        assert_eq!(
            provider_id_from_name("projects/demo/oauthIdpConfigs/oidc.x"),
            "oidc.x"
        );
        assert_eq!(provider_id_from_name("oidc.x"), "oidc.x");
    }

    #[test]
    fn list_bounds() {
        let m = manager();
        assert!(m.list_oidc(None, 0).is_err());
        assert!(m.list_oidc(None, 101).is_err());
        let err = m.list_saml(Some(""), 10).unwrap_err();
        assert_eq!(err.code(), Some(AuthErrorCode::InvalidPageToken));
    }
}
