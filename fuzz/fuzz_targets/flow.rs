#![no_main]

use libfuzzer_sys::fuzz_target;
use minireq::http::{Method, Request};
use minireq::proto::{Flow, RecvResponseResult, SendRequestResult};

const METHODS: &[&str] = &["GET", "HEAD", "POST", "PUT", "DELETE"];

// The first byte picks the method, the second how the input is split into
// reads. The rest is fed to the flow as the server response.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let Ok(method) = Method::from_bytes(METHODS[data[0] as usize % METHODS.len()].as_bytes()) else {
        return;
    };
    let step = (data[1] as usize % 64) + 1;
    let input = &data[2..];

    let Ok(request) = Request::builder()
        .method(method)
        .uri("http://fuzz.test/path")
        .body(())
    else {
        return;
    };

    let Ok(flow) = Flow::new(request) else {
        return;
    };
    let mut flow = flow.proceed();

    let mut output = vec![0_u8; 1024];
    if flow.write(&mut output).is_err() {
        return;
    }

    let Some(SendRequestResult::RecvResponse(mut flow)) = flow.proceed() else {
        return;
    };

    let mut pos = 0;
    let mut end = 0;

    while !flow.can_proceed() {
        if end >= input.len() {
            return;
        }
        end = (end + step).min(input.len());

        match flow.try_response(&input[pos..end]) {
            Ok((used, _)) => pos += used,
            Err(_) => return,
        }
    }

    let mut flow = match flow.proceed() {
        Some(RecvResponseResult::RecvBody(flow)) => flow,
        Some(RecvResponseResult::Cleanup(flow)) => {
            let _ = flow.must_close_connection();
            return;
        }
        None => return,
    };

    let mut end = pos;

    while !flow.is_ended() {
        if end >= input.len() {
            break;
        }
        end = (end + step).min(input.len());

        match flow.read(&input[pos..end], &mut output) {
            Ok((used, _)) => pos += used,
            Err(_) => return,
        }
    }

    if let Some(flow) = flow.proceed() {
        let _ = flow.close_reason();
    }
});
