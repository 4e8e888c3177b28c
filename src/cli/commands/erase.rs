//! Erase patient command implementation
//!
//! This module implements the `erase-patient` command, which deletes a
//! patient's whole compartment or, with `--dry-run`, prints the deletion
//! plan.

use super::build_runtime;
use crate::adapters::access::RequestContext;
use crate::core::deletion::{CompartmentDeletionOrchestrator, DeletionPlan};
use crate::domain::PatientId;
use clap::Args;

/// Arguments for the erase-patient command
#[derive(Args, Debug)]
pub struct EraseArgs {
    /// Logical ID of the Patient resource
    pub patient_id: String,

    /// Print the deletion plan without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

impl EraseArgs {
    /// Execute the erase-patient command
    pub async fn execute(&self, config_path: &str, subject: &str) -> anyhow::Result<i32> {
        let patient_id = match PatientId::new(&self.patient_id) {
            Ok(id) => id,
            Err(e) => {
                println!("❌ Invalid patient ID: {e}");
                return Ok(2);
            }
        };

        let runtime = match build_runtime(config_path) {
            Ok(r) => r,
            Err(code) => return Ok(code),
        };

        tracing::info!(
            patient_id = %patient_id,
            dry_run = self.dry_run,
            "Erasing patient compartment"
        );

        let orchestrator = CompartmentDeletionOrchestrator::new(runtime.client, runtime.guard);
        let ctx = RequestContext::for_subject(subject);

        if self.dry_run {
            println!("🧪 Dry run: nothing will be deleted");
            println!();
            return match orchestrator.plan(&ctx, &patient_id).await {
                Ok(Some(plan)) => {
                    print!("{}", render_plan(&plan));
                    Ok(0)
                }
                Ok(None) => {
                    println!("Patient/{patient_id} has an empty compartment.");
                    Ok(0)
                }
                Err(e) => {
                    crate::log_error_with_context!(&e, "Planning compartment deletion");
                    println!("❌ Failed to plan deletion");
                    println!("   Error: {e}");
                    Ok(5)
                }
            };
        }

        match orchestrator
            .delete_patient_compartment(&ctx, &patient_id)
            .await
        {
            Ok(true) => {
                println!("✅ Patient/{patient_id} and its compartment were deleted");
                Ok(0)
            }
            Ok(false) => {
                println!("Patient/{patient_id} has an empty compartment, nothing deleted.");
                Ok(0)
            }
            Err(e) => {
                crate::log_error_with_context!(&e, "Deleting patient compartment");
                println!("❌ Compartment deletion stopped");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }
}

/// Renders the plan one bucket per block, in deletion order
fn render_plan(plan: &DeletionPlan) -> String {
    let mut out = format!("Deletion plan ({} resources):\n", plan.len());
    for (bucket, refs) in plan.buckets() {
        out.push_str(&format!("  {bucket} ({})\n", refs.len()));
        for reference in refs {
            out.push_str(&format!("    - {reference}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bundle;
    use serde_json::json;

    #[test]
    fn test_render_plan_lists_buckets_in_order() {
        let bundle = Bundle::from_payload(json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "Patient", "id": "p1"}},
                {"resource": {"resourceType": "MedicationRequest", "id": "m1"}}
            ]
        }))
        .unwrap();
        let plan = DeletionPlan::from_bundle(&bundle).unwrap().unwrap();

        let rendered = render_plan(&plan);
        let medication = rendered.find("MedicationRequest/m1").unwrap();
        let patient = rendered.find("Patient/p1").unwrap();
        assert!(medication < patient);
        assert!(rendered.starts_with("Deletion plan (2 resources):"));
        assert!(rendered.contains("  assorted (0)\n"));
    }
}
