//! # Tenant Resources
//!
//! CRUD and listing over the v2 `tenants` collection. A tenant is an isolated
//! namespace of users and provider configurations inside one project.

use serde::{Deserialize, Serialize};

use super::pages::{validate_page_token, Page};
use super::ApiClient;
use crate::errors::{FirebaseError, Result};

pub(crate) const MAX_LIST_TENANTS_RESULTS: u32 = 1000;

/// Resource names look like `projects/<p>/tenants/<id>`.
fn tenant_id_from_name(name: &str) -> String {
    name.rsplit('/').next().unwrap_or_default().to_owned()
}

pub(crate) fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    if tenant_id.is_empty() {
        return Err(FirebaseError::invalid_argument("tenant id must not be empty"));
    }
    Ok(())
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct TenantDTO {
    name: String,
    display_name: Option<String>,
    allow_password_signup: bool,
    enable_email_link_signin: bool,
}

/// One tenant of a multi-tenant project.
#[derive(Debug, Clone)]
pub struct Tenant {
    pub tenant_id: String,
    pub display_name: Option<String>,
    pub password_sign_in_allowed: bool,
    pub email_link_sign_in_enabled: bool,
}

impl Tenant {
    fn from_dto(dto: TenantDTO) -> Self {
        Tenant {
            tenant_id: tenant_id_from_name(&dto.name),
            display_name: dto.display_name,
            password_sign_in_allowed: dto.allow_password_signup,
            email_link_sign_in_enabled: dto.enable_email_link_signin,
        }
    }
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct TenantBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_password_signup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_email_link_signin: Option<bool>,
}

/// Parameters for creating a tenant.
#[derive(Debug, Default, Clone)]
pub struct TenantCreateRequest {
    display_name: Option<String>,
    password_sign_in_allowed: Option<bool>,
    email_link_sign_in_enabled: Option<bool>,
}

impl TenantCreateRequest {
    pub fn new() -> Self {
        TenantCreateRequest::default()
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_password_sign_in_allowed(mut self, allowed: bool) -> Self {
        self.password_sign_in_allowed = Some(allowed);
        self
    }

    pub fn with_email_link_sign_in_enabled(mut self, enabled: bool) -> Self {
        self.email_link_sign_in_enabled = Some(enabled);
        self
    }

    fn into_body(self) -> TenantBody {
        TenantBody {
            display_name: self.display_name,
            allow_password_signup: self.password_sign_in_allowed,
            enable_email_link_signin: self.email_link_sign_in_enabled,
        }
    }
}

/// Partial update of a tenant. Only fields that were set are patched.
#[derive(Debug, Default, Clone)]
pub struct TenantUpdateRequest {
    tenant_id: String,
    display_name: Option<String>,
    password_sign_in_allowed: Option<bool>,
    email_link_sign_in_enabled: Option<bool>,
}

impl TenantUpdateRequest {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        TenantUpdateRequest {
            tenant_id: tenant_id.into(),
            ..TenantUpdateRequest::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_password_sign_in_allowed(mut self, allowed: bool) -> Self {
        self.password_sign_in_allowed = Some(allowed);
        self
    }

    pub fn with_email_link_sign_in_enabled(mut self, enabled: bool) -> Self {
        self.email_link_sign_in_enabled = Some(enabled);
        self
    }

    /// Field paths of the set properties, in declaration order.
    pub(crate) fn update_mask(&self) -> Vec<String> {
        let mut mask = Vec::new();
        if self.display_name.is_some() {
            mask.push("displayName".to_owned());
        }
        if self.password_sign_in_allowed.is_some() {
            mask.push("allowPasswordSignup".to_owned());
        }
        if self.email_link_sign_in_enabled.is_some() {
            mask.push("enableEmailLinkSignin".to_owned());
        }
        mask
    }

    fn into_parts(self) -> Result<(String, Vec<String>, TenantBody)> {
        validate_tenant_id(&self.tenant_id)?;
        let mask = self.update_mask();
        if mask.is_empty() {
            return Err(FirebaseError::invalid_argument("update request changes nothing"));
        }
        Ok((
            self.tenant_id,
            mask,
            TenantBody {
                display_name: self.display_name,
                allow_password_signup: self.password_sign_in_allowed,
                enable_email_link_signin: self.email_link_sign_in_enabled,
            },
        ))
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ListTenantsResponse {
    tenants: Option<Vec<TenantDTO>>,
    next_page_token: Option<String>,
}

/// Tenant resource operations of one project.
pub(crate) struct TenantApi {
    client: ApiClient,
}

impl TenantApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        TenantApi { client }
    }

    pub(crate) fn create_tenant(&self, request: TenantCreateRequest) -> Result<Tenant> {
        let body = request.into_body();
        let dto: TenantDTO =
            self.client
                .post_json(&self.client.v2("/tenants"), &body, "create tenant")?;
        Ok(Tenant::from_dto(dto))
    }

    pub(crate) fn get_tenant(&self, tenant_id: &str) -> Result<Tenant> {
        validate_tenant_id(tenant_id)?;
        let url = self.client.v2(&format!("/tenants/{}", tenant_id));
        let dto: TenantDTO = self.client.get_json(&url, &[], "get tenant")?;
        Ok(Tenant::from_dto(dto))
    }

    pub(crate) fn update_tenant(&self, request: TenantUpdateRequest) -> Result<Tenant> {
        let (tenant_id, mask, body) = request.into_parts()?;
        let url = self.client.v2(&format!("/tenants/{}", tenant_id));
        let dto: TenantDTO =
            self.client
                .patch_json(&url, &[("updateMask", mask.join(","))], &body, "update tenant")?;
        Ok(Tenant::from_dto(dto))
    }

    pub(crate) fn delete_tenant(&self, tenant_id: &str) -> Result<()> {
        validate_tenant_id(tenant_id)?;
        let url = self.client.v2(&format!("/tenants/{}", tenant_id));
        self.client.delete(&url, "delete tenant")
    }

    pub(crate) fn list_tenants(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<Tenant>> {
        validate_page_token(page_token)?;
        if page_size == 0 || page_size > MAX_LIST_TENANTS_RESULTS {
            return Err(FirebaseError::invalid_argument(format!(
                "page size must be between 1 and {}",
                MAX_LIST_TENANTS_RESULTS
            )));
        }
        let mut query = vec![("pageSize", page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_owned()));
        }
        let response: ListTenantsResponse =
            self.client
                .get_json(&self.client.v2("/tenants"), &query, "list tenants")?;
        Ok(Page::new(
            response
                .tenants
                .unwrap_or_default()
                .into_iter()
                .map(Tenant::from_dto)
                .collect(),
            response.next_page_token,
        ))
    }

}
