//! Routing Pre-Processor — TFQDN integration (spec §4.7).
//!
//! Rewrites the outgoing request (headers, `:path`, `:authority`, body)
//! based on dynamic metadata the upstream TFQDN-decoding stage attached
//! and the chosen endpoint's declared `support` capability. Grounded on
//! the teacher's `http/filters.rs` (`HeaderModifier::apply`,
//! `UrlRewrite::apply`): mutate a `HeaderMap`/`Uri` in place, return
//! `Result<(), Error>`.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request, Uri};

use crate::error::FilterError;

const HDR_TARGET_API_ROOT: &str = "3gpp-sbi-target-apiroot";
const HDR_TARGET_API_ROOT_LEGACY: &str = "target-api-root";
const HDR_CONTENT_LENGTH: &str = "content-length";

/// What the chosen upstream endpoint declared it can consume: the
/// original NF representation, a TFQDN-encoded authority, or the
/// legacy "indirect" `3gpp-Sbi-target-apiRoot` header scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSupport {
	Nf,
	Tfqdn,
	Indirect,
}

/// The dynamic-metadata keys an upstream TFQDN-decoding stage attaches
/// before this pre-processor runs (spec §4.7).
#[derive(Debug, Clone, Default)]
pub struct RoutingMetadata {
	pub absolute_path_processing: bool,
	pub absolute_path_value: Option<String>,
	pub target_api_root_processing: bool,
	pub target_api_root_value: Option<String>,
	pub sepp_routing_direction: Option<String>,
	pub original_body_was_replaced: bool,
	pub original_body: Option<Bytes>,
	pub modified_body: Option<Bytes>,
	pub relative_path_value: Option<String>,
	pub keep_authority_header: bool,
	pub preferred_host: Option<String>,
}

impl RoutingMetadata {
	fn is_ext_to_int(&self) -> bool {
		self.sepp_routing_direction.as_deref() == Some("ext_to_int")
	}
}

fn set_path(req: &mut Request<Bytes>, new_path: &str) -> Result<(), FilterError> {
	let mut parts = req.uri().clone().into_parts();
	parts.path_and_query = Some(new_path.parse()?);
	*req.uri_mut() = Uri::from_parts(parts).map_err(|_| FilterError::UriBuildFailed)?;
	Ok(())
}

fn replace_body(req: &mut Request<Bytes>, body: Bytes) {
	let len = body.len();
	*req.body_mut() = body;
	req
		.headers_mut()
		.insert(HeaderName::from_static(HDR_CONTENT_LENGTH), HeaderValue::from_str(&len.to_string()).unwrap());
}

/// Apply the routing-preprocessor rules for `support` to `req`, per
/// spec §4.7. The legacy `Target-Api-Root` header alias is stripped in
/// all three branches.
pub fn process(
	req: &mut Request<Bytes>,
	meta: &RoutingMetadata,
	support: EndpointSupport,
	endpoint_host: &str,
) -> Result<(), FilterError> {
	req.headers_mut().remove(HDR_TARGET_API_ROOT_LEGACY);

	match support {
		EndpointSupport::Nf => {
			req.headers_mut().remove(HDR_TARGET_API_ROOT);
			if meta.absolute_path_processing {
				if let Some(path) = &meta.relative_path_value {
					set_path(req, path)?;
				}
			}
			if meta.original_body_was_replaced {
				if let Some(body) = meta.original_body.clone() {
					replace_body(req, body);
				}
			}
		},
		EndpointSupport::Tfqdn => {
			req.headers_mut().remove(HDR_TARGET_API_ROOT);
			if meta.absolute_path_processing {
				if let Some(path) = &meta.relative_path_value {
					set_path(req, path)?;
				}
			}
			if meta.is_ext_to_int() {
				if let Some(body) = meta.modified_body.clone() {
					replace_body(req, body);
				}
			}
		},
		EndpointSupport::Indirect => {
			if meta.target_api_root_processing {
				match &meta.target_api_root_value {
					Some(value) => {
						req
							.headers_mut()
							.insert(HeaderName::from_static(HDR_TARGET_API_ROOT), HeaderValue::from_str(value)?);
					},
					None => {
						req.headers_mut().remove(HDR_TARGET_API_ROOT);
					},
				}
			}
			if meta.absolute_path_processing {
				if let Some(path) = &meta.absolute_path_value {
					set_path(req, path)?;
				}
			}
			if !meta.keep_authority_header {
				let authority = meta.preferred_host.as_deref().unwrap_or(endpoint_host);
				let mut parts = req.uri().clone().into_parts();
				parts.authority = Some(authority.parse()?);
				*req.uri_mut() = Uri::from_parts(parts).map_err(|_| FilterError::UriBuildFailed)?;
			}
		},
	}
	Ok(())
}
