//! Error types for the bean container

use thiserror::Error;

/// Coarse classification of a [`BeanError`].
///
/// Lets callers tell an optional dependency that is simply absent apart from a
/// required one that is broken, without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing, invalid or abstract bean definition
    Definition,
    /// Instantiation, population or lifecycle callback failure
    Creation,
    /// No candidate, ambiguous candidates or type mismatch
    Resolution,
    /// Unresolvable circular reference
    Circular,
    /// Container state errors and user errors
    Other,
}

/// Errors that can occur while defining, creating or resolving beans
#[derive(Error, Debug, Clone)]
pub enum BeanError {
    /// No bean with the given name (or alias) is known to the container
    #[error("No bean named '{name}' available")]
    NoSuchBean { name: String },

    /// No bean matches the requested type
    #[error("No qualifying bean of type '{type_name}' available: {message}")]
    NoSuchBeanOfType { type_name: String, message: String },

    /// Several beans match where exactly one was expected
    #[error(
        "No qualifying bean of type '{type_name}' available: {message}: {}",
        .names.join(",")
    )]
    NoUniqueBean {
        type_name: String,
        names: Vec<String>,
        message: String,
    },

    /// A bean exists under the name but exposes a different type
    #[error("Bean named '{name}' is expected to be of type '{required}' but was actually of type '{actual}'")]
    BeanNotOfRequiredType {
        name: String,
        required: String,
        actual: String,
    },

    /// Creating a bean failed
    #[error("Error creating bean with name '{name}': {message}")]
    BeanCreation {
        name: String,
        message: String,
        #[source]
        cause: Option<Box<BeanError>>,
        /// Suppressed errors seen while probing alternative resolution paths
        related: Vec<BeanError>,
    },

    /// The bean is already being created on this resolution path
    #[error(
        "Error creating bean with name '{name}': Requested bean is currently in creation: {message}"
    )]
    CurrentlyInCreation { name: String, message: String },

    /// A dependency expressed through a constructor parameter or property could not be satisfied
    #[error("Error creating bean with name '{bean}': Unsatisfied dependency expressed through {injection_point}: {message}")]
    UnsatisfiedDependency {
        bean: String,
        injection_point: String,
        message: String,
        #[source]
        cause: Option<Box<BeanError>>,
    },

    /// The bean definition is invalid
    #[error("Invalid bean definition with name '{name}': {message}")]
    BeanDefinition { name: String, message: String },

    /// An abstract definition was asked to produce an instance
    #[error("Error creating bean with name '{name}': Bean definition is abstract")]
    BeanIsAbstract { name: String },

    /// Definition overriding is disabled and the name is taken
    #[error("Invalid bean definition with name '{name}': Cannot register bean definition for bean '{name}' since there is already one bound")]
    DefinitionOverride { name: String },

    /// A class reference could not be resolved against the class registry
    #[error("Cannot resolve class [{class_name}] for bean with name '{name}'")]
    CannotLoadClass { name: String, class_name: String },

    /// A value could not be converted to the required type
    #[error("Failed to convert value of type '{from}' to required type '{to}'{}", detail_suffix(.detail))]
    TypeMismatch {
        from: String,
        to: String,
        detail: Option<String>,
    },

    /// Singleton creation was requested during container shutdown
    #[error("Error creating bean with name '{name}': Singleton bean creation not allowed while singletons of this container are in destruction")]
    CreationNotAllowed { name: String },

    /// The configuration has been frozen
    #[error("Container configuration is frozen - cannot modify bean definitions")]
    ConfigurationFrozen,

    /// A deferred handle outlived its container
    #[error("Owning container has been dropped")]
    ContainerDropped,

    /// Error raised by user code (constructors, setters, lifecycle methods)
    #[error("{0}")]
    Custom(String),
}

impl BeanError {
    /// Create a NoSuchBean error
    #[inline]
    pub fn no_such_bean(name: impl Into<String>) -> Self {
        Self::NoSuchBean { name: name.into() }
    }

    /// Create a BeanCreation error without a cause
    #[inline]
    pub fn creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BeanCreation {
            name: name.into(),
            message: message.into(),
            cause: None,
            related: Vec::new(),
        }
    }

    /// Create a BeanCreation error wrapping a cause
    #[inline]
    pub fn creation_caused_by(
        name: impl Into<String>,
        message: impl Into<String>,
        cause: BeanError,
    ) -> Self {
        Self::BeanCreation {
            name: name.into(),
            message: message.into(),
            cause: Some(Box::new(cause)),
            related: Vec::new(),
        }
    }

    /// Create a BeanDefinition error
    #[inline]
    pub fn definition(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BeanDefinition {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a CurrentlyInCreation error
    #[inline]
    pub fn currently_in_creation(name: impl Into<String>) -> Self {
        Self::CurrentlyInCreation {
            name: name.into(),
            message: "Is there an unresolvable circular reference?".into(),
        }
    }

    /// Create an UnsatisfiedDependency error
    #[inline]
    pub fn unsatisfied(
        bean: impl Into<String>,
        injection_point: impl Into<String>,
        cause: BeanError,
    ) -> Self {
        Self::UnsatisfiedDependency {
            bean: bean.into(),
            injection_point: injection_point.into(),
            message: cause.to_string(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Create a TypeMismatch error
    #[inline]
    pub fn type_mismatch(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::TypeMismatch {
            from: from.into(),
            to: to.into(),
            detail: None,
        }
    }

    /// Create a TypeMismatch error with an explanation
    #[inline]
    pub fn type_mismatch_because(
        from: impl Into<String>,
        to: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            from: from.into(),
            to: to.into(),
            detail: Some(detail.into()),
        }
    }

    /// Create an error from user code
    #[inline]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BeanDefinition { .. }
            | Self::BeanIsAbstract { .. }
            | Self::DefinitionOverride { .. }
            | Self::CannotLoadClass { .. } => ErrorKind::Definition,
            Self::BeanCreation { .. } | Self::CreationNotAllowed { .. } => ErrorKind::Creation,
            Self::NoSuchBean { .. }
            | Self::NoSuchBeanOfType { .. }
            | Self::NoUniqueBean { .. }
            | Self::BeanNotOfRequiredType { .. }
            | Self::UnsatisfiedDependency { .. }
            | Self::TypeMismatch { .. } => ErrorKind::Resolution,
            Self::CurrentlyInCreation { .. } => ErrorKind::Circular,
            Self::ConfigurationFrozen | Self::ContainerDropped | Self::Custom(_) => {
                ErrorKind::Other
            }
        }
    }

    /// The wrapped cause, if any.
    pub fn cause(&self) -> Option<&BeanError> {
        match self {
            Self::BeanCreation { cause, .. } | Self::UnsatisfiedDependency { cause, .. } => {
                cause.as_deref()
            }
            _ => None,
        }
    }

    /// The innermost error of the cause chain.
    pub fn root_cause(&self) -> &BeanError {
        let mut current = self;
        while let Some(next) = current.cause() {
            current = next;
        }
        current
    }

    /// Whether this error or any of its causes is an unresolvable circular reference.
    pub fn is_circular_reference(&self) -> bool {
        let mut current = Some(self);
        while let Some(err) = current {
            if matches!(err, Self::CurrentlyInCreation { .. }) {
                return true;
            }
            current = err.cause();
        }
        false
    }

    /// Whether this error (or its cause chain) is a `NoSuchBean*` lookup failure.
    pub fn is_no_such_bean(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::NoSuchBean { .. } | Self::NoSuchBeanOfType { .. } | Self::NoUniqueBean { .. }
        )
    }

    /// Suppressed errors attached as related causes.
    pub fn related(&self) -> &[BeanError] {
        match self {
            Self::BeanCreation { related, .. } => related,
            _ => &[],
        }
    }

    /// Attach suppressed errors. Only creation errors carry related causes.
    pub fn with_related(mut self, errors: Vec<BeanError>) -> Self {
        if let Self::BeanCreation { related, .. } = &mut self {
            related.extend(errors);
        }
        self
    }

    /// Name of the bean this error is about, if it names one.
    pub fn bean_name(&self) -> Option<&str> {
        match self {
            Self::NoSuchBean { name }
            | Self::BeanNotOfRequiredType { name, .. }
            | Self::BeanCreation { name, .. }
            | Self::CurrentlyInCreation { name, .. }
            | Self::BeanDefinition { name, .. }
            | Self::BeanIsAbstract { name }
            | Self::DefinitionOverride { name }
            | Self::CannotLoadClass { name, .. }
            | Self::CreationNotAllowed { name } => Some(name),
            Self::UnsatisfiedDependency { bean, .. } => Some(bean),
            _ => None,
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default()
}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, BeanError>;
