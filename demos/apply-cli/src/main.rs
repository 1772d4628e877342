use std::fs;
use std::path::PathBuf;

use clap::Parser;
use kube::api::DynamicObject;
use reconcile_apply::{
    ApplyEngine,
    ApplyOptions,
    KubeObjectStore,
    Owner,
};
use reconcile_core::errors::EmptyResult;
use reconcile_core::external::{
    LabelOwnerStamper,
    NoopNormalizer,
    Normalizer,
    OwnerLabelStamper,
};
use reconcile_core::logging;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(about = "apply a directory of manifests with the reconcile-apply engine", version)]
struct Args {
    #[arg(long_help = "YAML files or directories of YAML files to apply")]
    paths: Vec<PathBuf>,

    #[arg(long, default_value = "reconcile-apply", long_help = "field manager name to apply under")]
    field_manager: String,

    #[arg(long, default_value = "example.com", long_help = "annotation/label group used for selector keys")]
    group: String,

    #[arg(long, default_value = "apply-cli", long_help = "name stamped into the owner labels")]
    owner_name: String,

    #[arg(long, default_value = "default", long_help = "namespace stamped into the owner labels")]
    owner_namespace: String,

    #[arg(long, long_help = "allow forced delete+recreate when a diff needs an immutable field changed")]
    force: bool,

    #[arg(short, long, default_value = "info")]
    verbosity: String,
}

fn load_manifests(paths: &[PathBuf]) -> anyhow::Result<Vec<DynamicObject>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in fs::read_dir(path)? {
                let entry = entry?;
                if entry.path().extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
                    files.push(entry.path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    let mut objects = Vec::new();
    for file in files {
        let contents = fs::read_to_string(&file)?;
        for doc in serde_yaml::Deserializer::from_str(&contents) {
            let obj = DynamicObject::deserialize(doc)?;
            objects.push(obj);
        }
    }

    Ok(objects)
}

#[tokio::main]
async fn main() -> EmptyResult {
    let args = Args::parse();
    logging::setup_for_cli(&args.verbosity);

    let mut objects = load_manifests(&args.paths)?;
    println!("loaded {} object(s) from {} path(s)", objects.len(), args.paths.len());

    LabelOwnerStamper::new(args.group.clone()).set_owner_labels(&mut objects, &args.owner_name, &args.owner_namespace);
    NoopNormalizer.normalize_list(&mut objects);

    let client = kube::Client::try_default().await?;
    let store = KubeObjectStore::new(client);
    let owner = Owner::new(args.field_manager, args.group);
    let engine = ApplyEngine::new(store, owner);

    let mut opts = ApplyOptions::default();
    opts.force = args.force;

    let cancel = CancellationToken::new();
    let changeset = engine.apply_all_staged(objects, &opts, &cancel).await?;

    for entry in changeset.iter() {
        println!("{:<12} {}", format!("{:?}", entry.action), entry.subject);
    }

    Ok(())
}
