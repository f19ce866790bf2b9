use kube::CustomResourceExt;
use lm_api::v1beta2::*;

fn main() -> Result<(), serde_yaml::Error> {
    for crd in [Kyma::crd(), Manifest::crd(), ModuleTemplate::crd(), ModuleReleaseMeta::crd(), Watcher::crd()] {
        println!("---");
        println!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
