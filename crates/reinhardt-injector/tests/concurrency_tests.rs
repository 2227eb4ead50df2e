//! Concurrent lookups against one injector

use reinhardt_injector::{
	ConstructorDecl, Injector, Instance, Key, MemberDecl, Parameter, Scope, StaticCatalog,
	TypeDescriptor,
};
use rstest::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, OnceLock, mpsc};
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;

fn injector(constructed: Arc<AtomicUsize>) -> Injector {
	let catalog = StaticCatalog::new()
		.with(
			TypeDescriptor::concrete("Service")
				.scoped(Scope::Singleton)
				.constructor(ConstructorDecl::new(move |_| {
					constructed.fetch_add(1, Ordering::SeqCst);
					// Widen the window in which racing callers overlap.
					thread::yield_now();
					Ok(Instance::new(String::from("service")))
				})),
		)
		.with(TypeDescriptor::concrete("Request").constructor(ConstructorDecl::new(|_| Ok(Instance::new(0_u32)))));
	Injector::builder().catalog(catalog).build().unwrap()
}

#[rstest]
fn test_just_in_time_binding_identity_shared_across_threads() {
	// Arrange
	let injector = injector(Arc::new(AtomicUsize::new(0)));
	let barrier = Barrier::new(THREADS);

	// Act
	let bindings: Vec<_> = thread::scope(|s| {
		let handles: Vec<_> = (0..THREADS)
			.map(|_| {
				s.spawn(|| {
					barrier.wait();
					injector.get_binding(&Key::of("Request")).unwrap()
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	// Assert
	assert!(bindings.iter().all(|b| Arc::ptr_eq(b, &bindings[0])));
	assert_eq!(injector.get_all_bindings().len(), 3);
}

#[rstest]
fn test_singleton_constructed_once_under_contention() {
	// Arrange
	let constructed = Arc::new(AtomicUsize::new(0));
	let injector = injector(constructed.clone());
	let barrier = Barrier::new(THREADS);

	// Act
	let instances: Vec<Instance> = thread::scope(|s| {
		let handles: Vec<_> = (0..THREADS)
			.map(|_| {
				s.spawn(|| {
					barrier.wait();
					injector.get_instance(&Key::of("Service")).unwrap()
				})
			})
			.collect();
		handles.into_iter().map(|h| h.join().unwrap()).collect()
	});

	// Assert
	assert_eq!(constructed.load(Ordering::SeqCst), 1);
	assert!(instances.iter().all(|i| i.ptr_eq(&instances[0])));
}

#[rstest]
fn test_clones_share_caches() {
	// Arrange
	let constructed = Arc::new(AtomicUsize::new(0));
	let injector = injector(constructed.clone());
	let clone = injector.clone();

	// Act
	let from_injector = injector.get_instance(&Key::of("Service")).unwrap();
	let from_clone = thread::spawn(move || clone.get_instance(&Key::of("Service")).unwrap())
		.join()
		.unwrap();

	// Assert
	assert!(from_injector.ptr_eq(&from_clone));
	assert_eq!(constructed.load(Ordering::SeqCst), 1);
}

struct Gate;

struct Owner {
	part: Arc<Part>,
}

struct Part {
	owner: OnceLock<Arc<Owner>>,
}

/// `Owner` takes `Part` through its constructor and `Part` takes `Owner`
/// through a field. Both constructors meet at `gate`.
fn cyclic_singletons(gate: Arc<Barrier>) -> Injector {
	let at_gate = gate.clone();
	let catalog = StaticCatalog::new()
		.with(TypeDescriptor::concrete("Gate").constructor(ConstructorDecl::new(move |_| {
			at_gate.wait();
			Ok(Instance::new(Gate))
		})))
		.with(
			TypeDescriptor::concrete("Owner").scoped(Scope::Singleton).constructor(
				ConstructorDecl::new(|args| {
					let part = args[1]
						.downcast::<Part>()
						.ok_or_else(|| anyhow::anyhow!("expected a Part"))?;
					Ok(Instance::new(Owner { part }))
				})
				.annotated()
				.param(Parameter::of("Gate"))
				.param(Parameter::of("Part")),
			),
		)
		.with(
			TypeDescriptor::concrete("Part")
				.scoped(Scope::Singleton)
				.constructor(ConstructorDecl::new(move |_| {
					gate.wait();
					Ok(Instance::new(Part { owner: OnceLock::new() }))
				}))
				.member(MemberDecl::field("owner", Parameter::of("Owner"), |target, value| {
					let part = target
						.downcast_ref::<Part>()
						.ok_or_else(|| anyhow::anyhow!("expected a Part"))?;
					let owner = value
						.downcast::<Owner>()
						.ok_or_else(|| anyhow::anyhow!("expected an Owner"))?;
					let _ = part.owner.set(owner);
					Ok(())
				})),
		);
	Injector::builder().catalog(catalog).build().unwrap()
}

#[rstest]
fn test_cyclic_singletons_requested_from_both_ends() {
	// Arrange
	let injector = cyclic_singletons(Arc::new(Barrier::new(2)));
	let (sender, results) = mpsc::channel();

	// Act
	for root in ["Owner", "Part"] {
		let injector = injector.clone();
		let sender = sender.clone();
		thread::spawn(move || {
			let _ = sender.send((root, injector.get_instance(&Key::of(root))));
		});
	}
	let mut completed: Vec<(&str, Instance)> = (0..2)
		.map(|_| {
			let (root, result) = results
				.recv_timeout(Duration::from_secs(5))
				.expect("both lookups finish");
			(root, result.unwrap())
		})
		.collect();
	completed.sort_by_key(|(root, _)| *root);

	// Assert
	let owner = completed[0].1.downcast::<Owner>().unwrap();
	let part = completed[1].1.downcast::<Part>().unwrap();
	assert!(Arc::ptr_eq(&owner.part, &part));
	assert!(part.owner.get().is_some_and(|back| Arc::ptr_eq(back, &owner)));
}

struct Hub {
	spoke: OnceLock<Arc<Spoke>>,
}

struct Spoke {
	hub: OnceLock<Arc<Hub>>,
}

#[rstest]
fn test_singleton_hidden_until_member_cycle_is_wired() {
	// Arrange
	let wiring = Arc::new(Barrier::new(2));
	let in_setter = wiring.clone();
	let catalog = StaticCatalog::new()
		.with(
			TypeDescriptor::concrete("Hub")
				.scoped(Scope::Singleton)
				.constructor(ConstructorDecl::new(|_| Ok(Instance::new(Hub { spoke: OnceLock::new() }))))
				.member(MemberDecl::field("spoke", Parameter::of("Spoke"), |target, value| {
					let hub = target
						.downcast_ref::<Hub>()
						.ok_or_else(|| anyhow::anyhow!("expected a Hub"))?;
					let spoke = value
						.downcast::<Spoke>()
						.ok_or_else(|| anyhow::anyhow!("expected a Spoke"))?;
					let _ = hub.spoke.set(spoke);
					Ok(())
				})),
		)
		.with(
			TypeDescriptor::concrete("Spoke")
				.constructor(ConstructorDecl::new(|_| Ok(Instance::new(Spoke { hub: OnceLock::new() }))))
				.member(MemberDecl::field("hub", Parameter::of("Hub"), move |target, value| {
					// Holds the cycle half-wired while another thread asks for the hub.
					in_setter.wait();
					thread::sleep(Duration::from_millis(50));
					let spoke = target
						.downcast_ref::<Spoke>()
						.ok_or_else(|| anyhow::anyhow!("expected a Spoke"))?;
					let hub = value
						.downcast::<Hub>()
						.ok_or_else(|| anyhow::anyhow!("expected a Hub"))?;
					let _ = spoke.hub.set(hub);
					Ok(())
				})),
		);
	let injector = Injector::builder().catalog(catalog).build().unwrap();

	// Act
	let (first, second) = thread::scope(|s| {
		let builder = s.spawn(|| injector.get::<Hub>(&Key::of("Hub")).unwrap());
		wiring.wait();
		let second = injector.get::<Hub>(&Key::of("Hub")).unwrap();
		let wired = second.spoke.get().is_some_and(|spoke| spoke.hub.get().is_some());
		(builder.join().unwrap(), (second, wired))
	});

	// Assert
	let (second, wired) = second;
	assert!(wired);
	assert!(Arc::ptr_eq(&first, &second));
}
