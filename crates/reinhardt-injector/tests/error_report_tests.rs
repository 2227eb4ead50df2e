//! Integration tests for aggregated creation and resolution errors

use reinhardt_injector::{
	Binder, ConstructorDecl, ConstructorRef, DiError, ErrorPhase, Injector, InjectorConfig,
	Instance, Key, MemberDecl, Parameter, StaticCatalog, TypeDescriptor, TypeLiteral,
};
use rstest::*;

fn generic_c() -> TypeDescriptor {
	TypeDescriptor::concrete("C")
		.type_params(["T"])
		.constructor(
			ConstructorDecl::new(|_| Ok(Instance::new("c")))
				.param(Parameter::of("Stage"))
				.param(Parameter::of(TypeLiteral::variable("T"))),
		)
		.constructor(ConstructorDecl::new(|_| Ok(Instance::new("c"))).annotated())
		.member(MemberDecl::field(
			"anotherT",
			Parameter::of(TypeLiteral::variable("T")),
			|_, _| Ok(()),
		))
}

fn bacon_module(binder: &mut Binder) {
	binder.bind("Bacon").to_instance(Instance::new("pork"));
	binder.bind(Key::named("Bacon", "Turkey")).to_instance(Instance::new("turkey"));
	binder.bind(Key::named("Bacon", "Tofu")).to_instance(Instance::new("tofu"));
	binder.bind(Key::named("Bacon", "Cooked")).to_instance(Instance::new("cooked"));
}

#[rstest]
fn test_link_to_unbound_type_fails_creation() {
	// Act
	let report = Injector::builder()
		.module(|binder: &mut Binder| {
			binder.bind("Collection").to("List");
		})
		.build()
		.unwrap_err();

	// Assert
	let message = report.to_string();
	assert_eq!(report.phase(), ErrorPhase::Creation);
	assert!(message.starts_with("Unable to create injector, see the following errors:"));
	assert!(message.contains("1) No implementation for List was bound."));
	assert!(message.contains("Requested by: link from Collection"));
	assert!(message.ends_with("1 error"));
}

#[rstest]
fn test_unbound_interface_lookup_fails_resolution() {
	// Arrange
	let catalog = StaticCatalog::new().with(TypeDescriptor::abstract_type("Repository"));
	let injector = Injector::builder().catalog(catalog).build().unwrap();

	// Act
	let report = injector.get_instance(&Key::of("Repository")).unwrap_err();

	// Assert
	assert_eq!(report.phase(), ErrorPhase::Resolution);
	assert!(report.to_string().starts_with("Injector configuration errors:"));
	assert!(report.contains(|e| e.missing_key() == Some(&Key::of("Repository"))));
}

#[rstest]
fn test_missing_dependencies_reported_together() {
	// Arrange
	let catalog = StaticCatalog::new().with(
		TypeDescriptor::concrete("Checkout").constructor(
			ConstructorDecl::new(|_| Ok(Instance::new("checkout")))
				.annotated()
				.param(Parameter::of("Cart"))
				.param(Parameter::of("Payments")),
		),
	);

	// Act
	let report = Injector::builder()
		.catalog(catalog)
		.module(|binder: &mut Binder| {
			binder.bind("Checkout");
		})
		.build()
		.unwrap_err();

	// Assert
	let message = report.to_string();
	assert_eq!(report.len(), 2);
	assert!(message.contains("1) No implementation for Cart was bound."));
	assert!(message.contains("2) No implementation for Payments was bound."));
	assert!(message.contains("Requested by: Checkout.<init>, parameter 0"));
	assert!(message.contains("Requested by: Checkout.<init>, parameter 1"));
	assert!(message.ends_with("2 errors"));
}

#[rstest]
fn test_typo_suggests_closest_qualifier_first() {
	// Arrange
	let injector = Injector::builder().module(bacon_module).build().unwrap();

	// Act
	let message = injector
		.get_instance(&Key::named("Bacon", "Turky"))
		.unwrap_err()
		.to_string();

	// Assert
	let did_you_mean = message.find("Did you mean?").unwrap();
	let turkey = message.find("* Bacon annotated with @Named(\"Turkey\") bound at").unwrap();
	let tofu = message.find("* Bacon annotated with @Named(\"Tofu\") bound at").unwrap();
	assert!(did_you_mean < turkey);
	assert!(turkey < tofu);
	assert!(!message.contains("@Named(\"Cooked\")"));
	assert!(message.contains("1 more binding with other annotations."));
}

#[rstest]
fn test_case_mismatch_suggests_single_binding() {
	// Arrange
	let injector = Injector::builder()
		.module(|binder: &mut Binder| {
			binder.bind(Key::named("Bacon", "Turkey")).to_instance(Instance::new("turkey"));
		})
		.build()
		.unwrap();

	// Act
	let message = injector
		.get_instance(&Key::named("Bacon", "turkey"))
		.unwrap_err()
		.to_string();

	// Assert
	assert!(message.contains("No implementation for Bacon annotated with @Named(\"turkey\") was bound."));
	assert!(message.contains("* Bacon annotated with @Named(\"Turkey\") bound at"));
	assert!(!message.contains("more binding"));
}

#[rstest]
fn test_max_suggestions_from_config() {
	// Arrange
	let injector = Injector::builder()
		.config(InjectorConfig::default().with_max_suggestions(1))
		.module(bacon_module)
		.build()
		.unwrap();

	// Act
	let message = injector
		.get_instance(&Key::named("Bacon", "Turky"))
		.unwrap_err()
		.to_string();

	// Assert
	assert!(message.contains("@Named(\"Turkey\")"));
	assert!(!message.contains("@Named(\"Tofu\")"));
	assert!(message.contains("2 more bindings with other annotations."));
}

#[rstest]
fn test_related_types_suggested_without_same_type_binding() {
	// Arrange
	let injector = Injector::builder()
		.module(|binder: &mut Binder| {
			binder
				.bind(TypeLiteral::generic("List", vec![TypeLiteral::class("Butter")]))
				.to_instance(Instance::new(Vec::<u8>::new()));
			binder
				.bind(Key::named("ButterSandwich", "unsalted"))
				.to_instance(Instance::new("sandwich"));
		})
		.build()
		.unwrap();

	// Act
	let message = injector.get_instance(&Key::of("Butter")).unwrap_err().to_string();

	// Assert
	assert!(message.contains("No implementation for Butter was bound."));
	assert!(message.contains("* List<Butter> bound at"));
	assert!(message.contains("* ButterSandwich annotated with @Named(\"unsalted\") bound at"));
}

#[rstest]
fn test_raw_generic_to_constructor_fails_at_creation() {
	// Arrange
	let catalog = StaticCatalog::new().with(generic_c());

	// Act
	let report = Injector::builder()
		.catalog(catalog)
		.module(|binder: &mut Binder| {
			binder.bind("C").to_constructor(ConstructorRef::at("C", 0));
		})
		.build()
		.unwrap_err();

	// Assert
	let message = report.to_string();
	assert_eq!(report.phase(), ErrorPhase::Creation);
	assert_eq!(report.len(), 2);
	assert!(message.contains("T cannot be used as a key; it is not fully specified.\n  at C<T>.<init>"));
	assert!(message.contains("T cannot be used as a key; it is not fully specified.\n  at C<T>.anotherT"));
}

#[rstest]
fn test_generic_binding_key_must_be_fully_specified() {
	// Act
	let report = Injector::builder()
		.module(|binder: &mut Binder| {
			binder
				.bind(TypeLiteral::generic("Box", vec![TypeLiteral::variable("V")]))
				.to_instance(Instance::new(0_u8));
		})
		.build()
		.unwrap_err();

	// Assert
	assert!(report.contains(|e| matches!(e, DiError::UnresolvedGenericType { variable, .. } if variable == "V")));
}

#[rstest]
fn test_more_than_one_annotated_constructor() {
	// Arrange
	let catalog = StaticCatalog::new().with(
		TypeDescriptor::concrete("TooMany")
			.constructor(ConstructorDecl::new(|_| Ok(Instance::new(1))).annotated())
			.constructor(
				ConstructorDecl::new(|_| Ok(Instance::new(2)))
					.annotated()
					.param(Parameter::of("Stage")),
			),
	);
	let injector = Injector::builder().catalog(catalog).build().unwrap();

	// Act
	let report = injector.get_instance(&Key::of("TooMany")).unwrap_err();

	// Assert
	let message = report.to_string();
	assert!(report.contains(|e| matches!(e, DiError::Configuration { .. })));
	assert!(message.contains("TooMany has more than one constructor annotated"));
	assert!(message.contains("TooMany.<init>[0], TooMany.<init>[1]"));
}

#[rstest]
#[case(true, "its no-argument constructor is private")]
#[case(false, "must have either one (and only one) annotated constructor")]
fn test_no_injectable_constructor(#[case] private_no_arg: bool, #[case] detail: &str) {
	// Arrange
	let constructor = if private_no_arg {
		ConstructorDecl::new(|_| Ok(Instance::new(())))
			.visibility(reinhardt_injector::Visibility::Private)
	} else {
		ConstructorDecl::new(|_| Ok(Instance::new(()))).param(Parameter::of("Stage"))
	};
	let catalog =
		StaticCatalog::new().with(TypeDescriptor::concrete("PrivateNoArg").constructor(constructor));
	let injector = Injector::builder().catalog(catalog).build().unwrap();

	// Act
	let message = injector
		.get_instance(&Key::of("PrivateNoArg"))
		.unwrap_err()
		.to_string();

	// Assert
	assert!(message.contains("No injectable constructor for type PrivateNoArg"));
	assert!(message.to_lowercase().contains(&detail.to_lowercase()));
}

#[rstest]
fn test_duplicate_binding_fails_creation() {
	// Act
	let report = Injector::builder()
		.module(|binder: &mut Binder| {
			binder.bind("Greeting").to_instance(Instance::new("hello"));
			binder.bind("Greeting").to_instance(Instance::new("bonjour"));
		})
		.build()
		.unwrap_err();

	// Assert
	assert!(report.contains(|e| matches!(e, DiError::DuplicateBinding { key, .. } if *key == Key::of("Greeting"))));
	assert!(report.to_string().contains("A binding to Greeting was already configured at"));
}

#[rstest]
fn test_self_link_fails_creation() {
	// Act
	let report = Injector::builder()
		.module(|binder: &mut Binder| {
			binder.bind("Loop").to("Loop");
		})
		.build()
		.unwrap_err();

	// Assert
	assert!(report.to_string().contains("Binding for Loop points to itself."));
}

#[rstest]
fn test_explicit_bindings_required_refuses_just_in_time() {
	// Arrange
	let catalog = StaticCatalog::new()
		.with(TypeDescriptor::concrete("Clock").constructor(ConstructorDecl::new(|_| Ok(Instance::new(0_u64)))))
		.with(TypeDescriptor::concrete("Timer").constructor(ConstructorDecl::new(|_| Ok(Instance::new(1_u64)))));
	let injector = Injector::builder()
		.catalog(catalog)
		.config(InjectorConfig::default().with_require_explicit_bindings(true))
		.module(|binder: &mut Binder| {
			binder.bind("Clock");
		})
		.build()
		.unwrap();

	// Act
	let bound = injector.get_instance(&Key::of("Clock"));
	let unbound = injector.get_instance(&Key::of("Timer"));

	// Assert
	assert!(bound.is_ok());
	assert!(
		unbound
			.unwrap_err()
			.to_string()
			.contains("Explicit bindings are required and Timer is not explicitly bound.")
	);
}

#[rstest]
fn test_provider_failure_names_key() {
	// Arrange
	let injector = Injector::builder()
		.module(|binder: &mut Binder| {
			binder
				.bind("Connection")
				.to_provider(|| -> anyhow::Result<Instance> { anyhow::bail!("database unreachable") });
		})
		.build()
		.unwrap();

	// Act
	let report = injector.get_instance(&Key::of("Connection")).unwrap_err();

	// Assert
	assert!(
		report
			.to_string()
			.contains("Error provisioning Connection: database unreachable")
	);
}

#[rstest]
fn test_downcast_mismatch_is_provision_error() {
	// Arrange
	let injector = Injector::builder()
		.module(|binder: &mut Binder| {
			binder.bind("Port").to_instance(Instance::new(8080_u16));
		})
		.build()
		.unwrap();

	// Act
	let report = injector.get::<String>(&Key::of("Port")).unwrap_err();

	// Assert
	assert!(report.contains(|e| matches!(e, DiError::Provision { .. })));
}
