pub mod v1beta2;

pub const API_GROUP: &str = "operator.kyma-project.io";
pub const API_VERSION: &str = "v1beta2";
