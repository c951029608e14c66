//! Lists the repositories an installation can access, then the app's own metadata.
//!
//! Set `GHAPP_ID`, `GHAPP_INSTALLATION_ID`, and `GHAPP_KEY_PATH` (PEM file). `GHAPP_BASE_URL`
//! points the demo at an Enterprise Server API root such as `https://ghe.example.com/api/v3`.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
use time::{Duration, OffsetDateTime};
// self
use ghapp_auth::{
	http::{HttpTransport, ReqwestTransport, RequestDeadline, join_url},
	http_types::Request,
	token::IssuanceRequest,
	transport::{AssertionTransport, ScopedTokenTransport},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let app_id = env::var("GHAPP_ID")?.parse::<u64>()?;
	let installation_id = env::var("GHAPP_INSTALLATION_ID")?.parse::<u64>()?;
	let key_path = env::var("GHAPP_KEY_PATH")?;
	let base_url = env::var("GHAPP_BASE_URL").unwrap_or_default();
	let http = Arc::new(ReqwestTransport::default());
	let app: AssertionTransport<ReqwestTransport> =
		AssertionTransport::from_key_file(http, app_id, &key_path)?;
	let installation = Arc::new(
		ScopedTokenTransport::builder(app.clone(), installation_id)
			.base_url(base_url)
			.issuance_request(IssuanceRequest::default().with_permission("metadata", "read"))
			.build()?,
	);
	let mut request = Request::get(
		join_url(installation.base_url(), "installation/repositories")?.as_str(),
	)
	.body(Vec::new())?;

	request
		.extensions_mut()
		.insert(RequestDeadline(OffsetDateTime::now_utc() + Duration::seconds(30)));

	let response = installation.send(request).await?;

	println!("Installation repositories answered with HTTP {}.", response.status());
	println!(
		"Token expires at {}.",
		installation.expiry().ok_or_else(|| eyre!("No token was cached."))?
	);

	let request = Request::get(join_url(installation.base_url(), "app")?.as_str()).body(Vec::new())?;
	let response = app.send(request).await?;

	println!("App metadata answered with HTTP {}.", response.status());
	println!("{}", String::from_utf8_lossy(response.body()));

	Ok(())
}
