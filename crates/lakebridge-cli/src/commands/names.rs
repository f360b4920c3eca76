//! `lakebridge names`: print every resource name derived from a bucket id, as text or json.

use lakebridge_core::{BucketId, ResourceNames};
use lakebridge_orchestrator::provisioner::plan;

pub fn names(bucket: &str, format: &str) -> anyhow::Result<()> {
    let bucket = BucketId::parse(bucket)?;
    let names = ResourceNames::derive(&bucket);
    println!("{}", render(&names, format)?);
    Ok(())
}

fn render(names: &ResourceNames, format: &str) -> anyhow::Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(names)?),
        _ => {
            let mut out = format!("bucket          {}\n", names.bucket);
            for (label, value) in [
                ("publication", &names.publication),
                ("destination", &names.destination),
                ("s3 access key", &names.s3_access_key),
                ("wrapper", &names.wrapper),
                ("fdw server", &names.fdw_server),
                ("namespace", &names.namespace),
                ("foreign schema", &names.foreign_schema),
            ] {
                out.push_str(&format!("{label:<16}{value}\n"));
            }
            out.push_str("\nconnect plan:\n");
            for (i, step) in plan(names).iter().enumerate() {
                out.push_str(&format!("  {}. {:<28} {}\n", i + 1, step.step.as_str(), step.resource));
            }
            Ok(out.trim_end().to_string())
        }
    }
}
