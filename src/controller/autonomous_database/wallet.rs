//! Client wallet download into a Secret

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::owner::{derived_labels, owner_reference};
use crate::controller::secrets::resolve_password;
use crate::controller::store::get_opt;
use crate::crd::AutonomousDatabase;
use crate::oci::OciClients;

pub const WALLET_KEY: &str = "wallet.zip";

/// Create the wallet Secret unless it already exists
pub(super) async fn ensure_wallet(
    adb: &AutonomousDatabase,
    database_id: &str,
    clients: &OciClients,
    ctx: &Context,
) -> Result<()> {
    let ns = adb.namespace().unwrap_or_default();
    let secret_name = adb.wallet_secret_name();
    if get_opt(ctx.secrets.as_ref(), &ns, &secret_name).await?.is_some() {
        debug!(secret = %secret_name, "Wallet secret already present");
        return Ok(());
    }

    let password = resolve_password(
        ctx.secrets.as_ref(),
        clients.secrets.as_ref(),
        &ns,
        &adb.spec.wallet.password,
    )
    .await?
    .ok_or_else(|| Error::ValidationError("wallet download requires spec.wallet.password".to_string()))?;

    let archive = clients.databases.generate_wallet(database_id, &password).await?;
    let secret = wallet_secret(adb, &secret_name, archive);
    ctx.secrets.create(&ns, &secret).await?;
    info!(secret = %secret_name, "Stored database wallet");
    Ok(())
}

fn wallet_secret(adb: &AutonomousDatabase, name: &str, archive: Vec<u8>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: adb.namespace(),
            labels: Some(derived_labels(&adb.name_any())),
            owner_references: Some(vec![owner_reference(adb)]),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(WALLET_KEY.to_string(), ByteString(archive))])),
        ..Default::default()
    }
}
