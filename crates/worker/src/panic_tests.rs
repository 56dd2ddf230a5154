use super::*;

#[tokio::test]
async fn panic_message_from_static_str() {
	let handle = spawn(TaskClass::Background, async { panic!("loader exploded") });
	let err = handle.await.unwrap_err();
	let msg = join_error_panic_message(err).expect("should be a panic");
	assert!(msg.contains("loader exploded"), "got: {msg}");
}

#[tokio::test]
async fn panic_message_from_formatted_string() {
	let slot = "wifi";
	let handle = spawn(TaskClass::Background, async move { panic!("slot {slot} broke") });
	let err = handle.await.unwrap_err();
	let msg = join_error_panic_message(err).expect("should be a panic");
	assert_eq!(msg, "slot wifi broke");
}

#[tokio::test]
async fn aborted_task_has_no_panic_message() {
	let handle = spawn(TaskClass::Interactive, async {
		tokio::time::sleep(std::time::Duration::from_secs(60)).await;
	});
	handle.abort();
	let err = handle.await.unwrap_err();
	assert!(join_error_panic_message(err).is_none());
}

#[test]
fn named_thread_runs_closure() {
	let handle = spawn_named_thread(TaskClass::Isolated, "shellbay-test", || {
		std::thread::current().name().map(str::to_string)
	})
	.expect("thread should spawn");
	assert_eq!(handle.join().ok().flatten().as_deref(), Some("shellbay-test"));
}
