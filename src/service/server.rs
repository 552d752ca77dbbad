// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the keypebble project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::http::Header;
use rocket::{routes, Build, Request, Response, Rocket};

use super::routes::{
    auth, auth_method_not_allowed, healthz, registry_token, service_account_token,
};
use crate::config::IssuerConfig;
use crate::error::Result;
use crate::jwt::TokenIssuer;
use crate::policy::PolicySource;

/// Policy used by the registry endpoint, if any
#[derive(Debug, Clone, Default)]
pub struct ServicePolicy(Option<PolicySource>);

impl ServicePolicy {
    pub fn new(source: Option<PolicySource>) -> Self {
        ServicePolicy(source)
    }

    pub fn source(&self) -> Option<&PolicySource> {
        self.0.as_ref()
    }
}

/// Forbid caching of issued tokens by clients and intermediaries
pub struct NoStore;

#[rocket::async_trait]
impl Fairing for NoStore {
    fn info(&self) -> Info {
        Info {
            name: "Add Cache-Control: no-store to token responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if request.uri().path().as_str() != "/healthz" {
            response.set_header(Header::new("Cache-Control", "no-store"));
            response.set_header(Header::new("Pragma", "no-cache"));
        }
    }
}

/// Build the token service
///
/// Everything the handlers need is passed in here and managed by Rocket;
/// there is no process-wide state.
///
/// # Arguments
///
/// * `figment` - Rocket configuration (address, port, log level)
/// * `config` - Issuer settings
/// * `policy` - Policy source for the registry endpoint; without one,
///   requested scopes are granted as parsed
pub fn build_rocket(
    figment: Figment,
    config: IssuerConfig,
    policy: Option<PolicySource>,
) -> Result<Rocket<Build>> {
    let issuer = TokenIssuer::new(config)?;

    Ok(rocket::custom(figment)
        .attach(NoStore)
        .mount(
            "/",
            routes![
                healthz,
                auth,
                auth_method_not_allowed,
                registry_token,
                service_account_token,
            ],
        )
        .manage(issuer)
        .manage(ServicePolicy::new(policy)))
}
