pub mod constants;
pub mod errors;
pub mod external;
pub mod k8s;
pub mod logging;
pub mod object;
pub mod store;

pub mod prelude {
    pub use k8s_openapi::api::core::v1 as corev1;
    pub use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
    pub use kube::{
        CustomResourceExt,
        ResourceExt,
    };

    pub use crate::constants::*;
    pub use crate::errors::EmptyResult;
    pub use crate::k8s::{
        KubeResourceExt,
        OpenApiResourceExt,
        GVK,
    };
    pub use crate::object::{
        stage_priority_for,
        StagePriority,
        Subject,
    };
}
