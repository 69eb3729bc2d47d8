use std::cell::{Cell, RefCell};
use std::rc::Rc;

use promise_js::{
  Completion, EventLoop, Function, PromiseState, Settled, TypeError, Value,
};

fn executor(f: impl Fn(Value, Value) -> Completion + 'static) -> Function {
  Function::new(move |_this, args| f(args[0].clone(), args[1].clone()))
}

fn call(f: &Value, arg: impl Into<Value>) -> Completion {
  f.call(&Value::Undefined, &[arg.into()])
}

#[test]
fn then_returns_a_new_promise_of_the_same_brand() {
  let event_loop = EventLoop::default();
  let promise = event_loop
    .brand()
    .construct(executor(|resolve, _| call(&resolve, 5)));

  let derived = promise.then(None, None);
  assert!(!derived.ptr_eq(&promise));
  assert!(event_loop.brand().is_brand_of(&derived));
  assert_eq!(
    event_loop.block_on(&derived).unwrap(),
    Settled::Fulfilled(Value::from(5))
  );
}

#[test]
fn fulfilling_more_than_once_keeps_the_first_value() {
  let event_loop = EventLoop::default();
  let promise = event_loop.brand().construct(executor(|resolve, _| {
    call(&resolve, true)?;
    call(&resolve, 5)
  }));

  assert_eq!(promise.state(), PromiseState::Fulfilled);
  assert_eq!(
    event_loop.block_on(&promise).unwrap(),
    Settled::Fulfilled(Value::Bool(true))
  );
}

#[test]
fn rejecting_more_than_once_keeps_the_first_reason() {
  let event_loop = EventLoop::default();
  let promise = event_loop.brand().construct(executor(|_, reject| {
    call(&reject, Value::error("foo"))?;
    call(&reject, Value::error("bar"))
  }));

  let reason = event_loop.block_on(&promise).unwrap().rejected().unwrap();
  assert_eq!(reason.as_error().unwrap().message(), "foo");
}

#[test]
fn mixed_resolve_and_reject_keeps_the_first_call() {
  let event_loop = EventLoop::default();
  let promise = event_loop.brand().construct(executor(|resolve, reject| {
    call(&reject, "first")?;
    call(&resolve, "second")
  }));

  assert_eq!(
    event_loop.block_on(&promise).unwrap(),
    Settled::Rejected(Value::from("first"))
  );
}

#[test]
fn executor_runs_synchronously_once_with_undefined_receiver() {
  let event_loop = EventLoop::default();
  let calls = Rc::new(Cell::new(0u32));
  let receiver: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));

  let executor = {
    let calls = calls.clone();
    let receiver = receiver.clone();
    Function::new(move |this, args| {
      calls.set(calls.get() + 1);
      *receiver.borrow_mut() = Some(this.clone());
      assert_eq!(args.len(), 2);
      assert!(args.iter().all(|a| a.as_function().is_some()));
      Ok(Value::Undefined)
    })
  };

  let promise = event_loop.brand().construct(executor);
  assert_eq!(calls.get(), 1);
  assert_eq!(*receiver.borrow(), Some(Value::Undefined));
  assert!(promise.is_pending());
}

#[test]
fn callbacks_passed_to_then_are_called_asynchronously() {
  let event_loop = EventLoop::default();
  let called = Rc::new(Cell::new(false));

  let promise = event_loop
    .brand()
    .construct(executor(|resolve, _| call(&resolve, ())));
  assert_eq!(promise.state(), PromiseState::Fulfilled);

  {
    let called = called.clone();
    promise.then(
      Some(Function::unary(move |_| {
        called.set(true);
        Ok(Value::Undefined)
      })),
      None,
    );
  }

  assert!(!called.get(), "callback must not run in the registering turn");
  event_loop.queue().perform_microtask_checkpoint();
  assert!(called.get());
}

#[test]
fn settling_a_pending_promise_does_not_run_callbacks_inline() {
  let event_loop = EventLoop::default();
  let called = Rc::new(Cell::new(false));
  let deferred = event_loop.brand().defer();

  {
    let called = called.clone();
    deferred.promise.then(
      Some(Function::unary(move |_| {
        called.set(true);
        Ok(Value::Undefined)
      })),
      None,
    );
  }

  call(&Value::Function(deferred.resolve.clone()), 1).unwrap();
  assert_eq!(deferred.promise.state(), PromiseState::Fulfilled);
  assert!(!called.get());
  assert_eq!(event_loop.queue().len(), 1);

  event_loop.queue().perform_microtask_checkpoint();
  assert!(called.get());
}

#[test]
fn executor_throw_becomes_rejection() {
  let event_loop = EventLoop::default();
  let error = Value::error("executor failed");
  let promise = {
    let error = error.clone();
    event_loop
      .brand()
      .construct(Function::new(move |_this, _args| Err(error.clone())))
  };

  let reason = event_loop.block_on(&promise).unwrap().rejected().unwrap();
  assert!(reason.same_value(&error));
}

#[test]
fn executor_throw_after_resolve_is_ignored() {
  let event_loop = EventLoop::default();
  let promise = event_loop.brand().construct(executor(|resolve, _| {
    call(&resolve, "ok")?;
    Err(Value::error("too late"))
  }));

  assert_eq!(
    event_loop.block_on(&promise).unwrap(),
    Settled::Fulfilled(Value::from("ok"))
  );
}

#[test]
fn throwing_inside_a_callback_turns_into_a_rejection() {
  let event_loop = EventLoop::default();
  let error = Value::error("Arbitrary error");

  let promise = {
    let error = error.clone();
    event_loop
      .brand()
      .resolve(5)
      .then(Some(Function::unary(move |_| Err(error.clone()))), None)
  };

  let reason = event_loop.block_on(&promise).unwrap().rejected().unwrap();
  assert!(reason.same_value(&error));
}

#[test]
fn returning_a_promise_from_a_callback_links_both_promises() {
  let event_loop = EventLoop::default();
  let brand = event_loop.brand().clone();

  let promise = brand.resolve("placeholder").then(
    Some(Function::unary(move |_| {
      Ok(Value::Promise(
        brand.construct(executor(|resolve, _| call(&resolve, 5))),
      ))
    })),
    None,
  );

  assert_eq!(
    event_loop.block_on(&promise).unwrap(),
    Settled::Fulfilled(Value::from(5))
  );
}

#[test]
fn callbacks_receive_undefined_receiver() {
  let event_loop = EventLoop::default();
  let receivers: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));

  let record = || {
    let receivers = receivers.clone();
    Function::new(move |this, _args| {
      receivers.borrow_mut().push(this.clone());
      Ok(Value::Undefined)
    })
  };

  event_loop.brand().resolve("value").then(Some(record()), None);
  event_loop.brand().reject("reason").then(None, Some(record()));
  event_loop.run_until_idle().unwrap();

  assert_eq!(*receivers.borrow(), vec![Value::Undefined, Value::Undefined]);
}

#[test]
fn reactions_on_a_settled_promise_run_in_registration_order() {
  let event_loop = EventLoop::default();
  let log: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
  let promise = event_loop.brand().resolve(1);

  for i in 1..=3u8 {
    let log = log.clone();
    promise.then(
      Some(Function::unary(move |_| {
        log.borrow_mut().push(i);
        Ok(Value::Undefined)
      })),
      None,
    );
  }

  assert!(log.borrow().is_empty());
  event_loop.run_until_idle().unwrap();
  assert_eq!(&*log.borrow(), &[1, 2, 3]);
}

#[test]
fn reactions_on_a_pending_promise_run_in_registration_order() {
  let event_loop = EventLoop::default();
  let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
  let deferred = event_loop.brand().defer();

  for name in ["a", "b", "c"] {
    let log = log.clone();
    deferred.promise.then(
      None,
      Some(Function::unary(move |_| {
        log.borrow_mut().push(name);
        Ok(Value::Undefined)
      })),
    );
  }

  deferred
    .reject
    .call(&Value::Undefined, &[Value::from("nope")])
    .unwrap();
  event_loop.run_until_idle().unwrap();
  assert_eq!(&*log.borrow(), &["a", "b", "c"]);
}

#[test]
fn resolving_a_promise_with_itself_rejects_with_type_error() {
  let event_loop = EventLoop::default();
  let deferred = event_loop.brand().defer();

  deferred
    .resolve
    .call(&Value::Undefined, &[Value::Promise(deferred.promise.clone())])
    .unwrap();

  let reason = event_loop
    .block_on(&deferred.promise)
    .unwrap()
    .rejected()
    .unwrap();
  let err = reason.as_error().unwrap();
  assert!(err.is_type_error());
  assert_eq!(err.kind(), promise_js::ErrorKind::Type(TypeError::SelfResolution));
}

#[test]
fn returning_the_derived_promise_from_its_own_handler_rejects() {
  let event_loop = EventLoop::default();
  let slot: Rc<RefCell<Option<promise_js::Promise>>> = Rc::new(RefCell::new(None));

  let derived = {
    let slot = slot.clone();
    event_loop.brand().resolve(1).then(
      Some(Function::unary(move |_| {
        Ok(slot.borrow().clone().map(Value::Promise).unwrap_or_default())
      })),
      None,
    )
  };
  *slot.borrow_mut() = Some(derived.clone());

  let reason = event_loop.block_on(&derived).unwrap().rejected().unwrap();
  assert!(reason.as_error().unwrap().is_type_error());
  slot.borrow_mut().take();
}

#[test]
fn missing_handlers_pass_values_and_reasons_through() {
  let event_loop = EventLoop::default();

  let fulfilled = event_loop
    .brand()
    .resolve("value")
    .then(None, Some(Function::unary(|_| Ok(Value::from("wrong")))))
    .then(None, None);
  assert_eq!(
    event_loop.block_on(&fulfilled).unwrap(),
    Settled::Fulfilled(Value::from("value"))
  );

  let reason = Value::error("reason");
  let rejected = event_loop
    .brand()
    .reject(reason.clone())
    .then(Some(Function::unary(|_| Ok(Value::from("wrong")))), None)
    .then(None, None);
  let observed = event_loop.block_on(&rejected).unwrap().rejected().unwrap();
  assert!(observed.same_value(&reason));
}

#[test]
fn catch_does_nothing_to_resolved_promises() {
  let event_loop = EventLoop::default();
  let value = Value::from(promise_js::Object::new());
  let resolved = event_loop.brand().resolve(value.clone());

  let next = resolved.catch(Some(Function::unary(Ok)));
  assert!(!next.ptr_eq(&resolved));
  let settled = event_loop.block_on(&next).unwrap().fulfilled().unwrap();
  assert!(settled.same_value(&value));
}

#[test]
fn catch_is_equivalent_to_then_without_fulfillment_handler() {
  let event_loop = EventLoop::default();
  let reason = Value::error("some error");
  let rejected = event_loop.brand().reject(reason.clone());

  let next = rejected.catch(Some(Function::unary(Ok)));
  let value = event_loop.block_on(&next).unwrap().fulfilled().unwrap();
  assert!(value.same_value(&reason));
}

#[test]
fn rejections_without_handlers_are_tracked_until_handled() {
  let event_loop = EventLoop::default();
  let queue = event_loop.queue().clone();

  let unhandled = event_loop.brand().reject("unhandled");
  let handled = event_loop.brand().reject("handled");
  handled.catch(Some(Function::unary(|_| Ok(Value::Undefined))));

  let reported = queue.take_unhandled_rejections();
  assert_eq!(reported.len(), 1);
  assert!(reported[0].ptr_eq(&unhandled));

  // The derived promise has no rejection handler, so the rejection moves to it.
  let derived = unhandled.then(Some(Function::unary(Ok)), None);
  while queue.run_next().is_some() {}
  let reported = queue.take_unhandled_rejections();
  assert_eq!(reported.len(), 1);
  assert!(reported[0].ptr_eq(&derived));
}

#[test]
fn checkpoints_forget_reported_rejections() {
  let event_loop = EventLoop::default();
  let queue = event_loop.queue().clone();

  for i in 0..100 {
    event_loop.brand().reject(i);
  }
  let later = event_loop.brand().reject("handled after the checkpoint");
  queue.perform_microtask_checkpoint();
  assert!(queue.take_unhandled_rejections().is_empty());

  // Handling a promise that was already reported is not an error.
  later.catch(Some(Function::unary(Ok)));
  queue.perform_microtask_checkpoint();
  assert!(queue.take_unhandled_rejections().is_empty());
}

#[test]
fn dropping_a_long_pending_chain_does_not_overflow_the_stack() {
  // A small stack makes one frame per link fail quickly.
  let handle = std::thread::Builder::new()
    .stack_size(256 * 1024)
    .spawn(|| {
      let event_loop = EventLoop::default();
      let root = event_loop.brand().defer();
      let mut tail = root.promise.clone();
      for _ in 0..50_000 {
        tail = tail.then(None, None);
      }
      assert!(tail.is_pending());
      drop(tail);
      drop(root);
    })
    .unwrap();
  handle.join().unwrap();
}

#[test]
fn dropping_a_chain_with_handlers_keeps_reachable_links_alive() {
  let event_loop = EventLoop::default();
  let root = event_loop.brand().defer();
  let mut links = Vec::new();
  let mut tail = root.promise.clone();
  for i in 0..1_000 {
    tail = tail.then(Some(Function::unary(move |v| {
      Ok(Value::Number(v.as_number().unwrap_or_default() + f64::from(i % 2)))
    })), None);
    if i % 100 == 0 {
      links.push(tail.clone());
    }
  }
  drop(tail);

  root
    .resolve
    .call(&Value::Undefined, &[Value::from(0)])
    .unwrap();
  drop(root);
  event_loop.run_until_idle().unwrap();

  // Link `i` has added one for every odd index before it.
  for (n, link) in links.iter().enumerate() {
    let i = n * 100;
    assert_eq!(link.result(), Some(Value::Number((i / 2) as f64)));
  }
}
