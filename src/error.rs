use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, AnnErr>;

/// The crate's error type.
///
/// Every variant is a caller defect or a corrupted-state condition, none of them is recovered
/// inside the crate.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnErr {
    WrongTokenKind {
        what: &'static str,
        expected: &'static str,
        got: &'static str,
    },
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    NotBuilt {
        component: String,
    },
    ZeroSize {
        what: &'static str,
    },
    SoftmaxSizeLocked {
        locked: usize,
        got: usize,
    },
    MissingLearningRate {
        component: String,
    },
    UnknownOption {
        component: String,
        option: String,
    },
    UnknownActivation(String),
    NonFiniteWeights {
        position: usize,
    },
    NotImplemented(&'static str),
    MatrixTooSmall {
        got: usize,
        expected: usize,
    },
    NonSimpleMatrix,
    InvalidRange {
        low: f32,
        high: f32,
        near_zero: f64,
    },
    WeightsNotShared {
        name: String,
    },
    DuplicateComponent {
        name: String,
    },
    MissingWeights {
        name: String,
    },
    MissingToken {
        component: String,
        what: &'static str,
    },
}

impl Display for AnnErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnnErr::WrongTokenKind {
                what,
                expected,
                got,
            } => format!("Incorrect {what} token kind, expected {expected} and got {got}"),
            AnnErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => format!(
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            AnnErr::NotBuilt { component } => {
                format!("Component '{component}' is not built")
            }
            AnnErr::ZeroSize { what } => format!("Impossible to build a zero sized {what}"),
            AnnErr::SoftmaxSizeLocked { locked, got } => format!(
                "A softmax activation locked to size {locked} was applied to units of size {got}"
            ),
            AnnErr::MissingLearningRate { component } => format!(
                "The learning rate of component '{component}' must be set to a positive value before updating"
            ),
            AnnErr::UnknownOption { component, option } => {
                format!("Component '{component}' has no option named '{option}'")
            }
            AnnErr::UnknownActivation(name) => {
                format!("Incorrect activation function type '{name}'")
            }
            AnnErr::NonFiniteWeights { position } => {
                format!("Non finite number found at weights position {position}")
            }
            AnnErr::NotImplemented(what) => format!("Not implemented: {what}"),
            AnnErr::MatrixTooSmall { got, expected } => {
                format!("Incorrect matrix size, was {got}, expected >= {expected}")
            }
            AnnErr::NonSimpleMatrix => {
                "Matrices need to be simple (not sub-matrix and in row-major)".to_string()
            }
            AnnErr::InvalidRange {
                low,
                high,
                near_zero,
            } => format!(
                "Invalid randomization range [{low}, {high}], both bounds must be farther than {near_zero} from zero"
            ),
            AnnErr::WeightsNotShared { name } => format!(
                "Weights dictionary contains '{name}' weights which are not shared with the component"
            ),
            AnnErr::DuplicateComponent { name } => {
                format!("Component name '{name}' is already registered with a different shape")
            }
            AnnErr::MissingWeights { name } => {
                format!("There are no weights named '{name}' in the registry")
            }
            AnnErr::MissingToken { component, what } => {
                format!("Component '{component}' has no {what} token, run the previous pass first")
            }
        };

        write!(f, "{s}")
    }
}

impl Error for AnnErr {}
