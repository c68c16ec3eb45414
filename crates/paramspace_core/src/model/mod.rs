mod argument;
mod attribute;
mod file;
mod function;
mod ids;
mod object;
mod perturbation;
mod variable;
mod workflow;

pub use argument::{Argument, ArgumentType, ArgumentValue, Quantity};
pub use attribute::{Attribute, AttributeValue, find_attribute};
pub use file::FileReference;
pub use function::{FunctionTerm, LinearFunction};
pub use ids::{ObjectId, VersionId};
pub use object::{AnalysisObject, ChangeType, ObjectMeta};
pub(crate) use object::leaf_analysis_object;
pub use perturbation::{MeasureDescriptor, MeasurePerturbation, NullPerturbation, Perturbation};
pub use variable::{
    ContinuousTransform, ContinuousVariable, DiscreteVariable, MAX_CONTINUOUS_SAMPLES, Variable,
    VariableValue,
};
pub use workflow::{FileType, JobType, StepKind, WorkflowStep};
