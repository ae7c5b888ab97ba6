// Progress tracking over a recorded ffmpeg stderr transcript

use ffplan::engine::{MAX_RUNNING_PERCENT, ProcessInfo, ProgressPhase, ProgressReport, ProgressTracker};
use std::sync::{Arc, Mutex};

// ffmpeg rewrites its status line with '\r'; the header lines end in '\n'
const TRANSCRIPT: &str = "Input #0, matroska,webm, from '/media/in.mkv':\n  \
Duration: 00:01:40.00, start: 0.000000, bitrate: 8120 kb/s\n  \
Stream #0:0: Video: h264 (High), yuv420p(progressive), 1920x1080, 23.98 fps\n\
frame=  240 fps=120 q=23.0 size=    1024kB time=00:00:10.01 bitrate= 838.0kbits/s speed=5.0x\r\
frame=  720 fps=120 q=23.0 size=    3072kB time=00:00:30.03 bitrate= 838.0kbits/s speed=5.0x\r\
frame=  600 fps=118 q=23.0 size=    3072kB time=00:00:25.00 bitrate= 838.0kbits/s speed=4.9x\r\
frame= 2396 fps=121 q=23.0 size=   10240kB time=00:01:39.95 bitrate= 838.0kbits/s speed=5.0x\r\
[out#0/matroska @ 0x5581] video:10240kB audio:1562kB muxing overhead: 0.1%\n";

fn lines() -> impl Iterator<Item = &'static str> {
    TRANSCRIPT.split(['\r', '\n']).filter(|l| !l.trim().is_empty())
}

fn run(mut tracker: ProgressTracker) -> (ProgressTracker, Vec<u8>) {
    let mut percents = Vec::new();
    let mut process = Some(ProcessInfo { pid: 31337 });
    for line in lines() {
        percents.push(tracker.parse(line, process.take()).percent);
    }
    (tracker, percents)
}

#[test]
fn test_transcript_with_known_duration() {
    let (mut tracker, percents) = run(ProgressTracker::new(100.0));
    assert_eq!(percents, vec![0, 0, 0, 10, 30, 30, 99, 99]);
    assert_eq!(tracker.state().pid, Some(31337));
    assert_eq!(tracker.finalize().percent, 100);
    assert_eq!(tracker.state().phase, ProgressPhase::Completed);
}

#[test]
fn test_transcript_duration_from_header() {
    let (tracker, percents) = run(ProgressTracker::new(0.0));
    assert_eq!(tracker.state().total_duration_seconds, 100.0);
    assert_eq!(*percents.last().unwrap(), MAX_RUNNING_PERCENT);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_sink_sees_every_report_then_100() {
    let seen: Arc<Mutex<Vec<ProgressReport>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let tracker =
        ProgressTracker::new(100.0).with_sink(move |r: ProgressReport| sink.lock().unwrap().push(r));
    let (mut tracker, percents) = run(tracker);
    tracker.finalize();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), percents.len() + 1);
    assert_eq!(seen.last().unwrap().percent, 100);
    assert!(seen.iter().all(|r| !r.paused && !r.killed));
}

#[test]
fn test_lines_before_registration_are_ignored() {
    let mut tracker = ProgressTracker::new(100.0);
    let early = "frame=  720 fps=120 q=23.0 size=    3072kB time=00:00:30.03 bitrate= 838.0kbits/s";
    assert_eq!(tracker.parse(early, None).percent, 0);
    assert_eq!(tracker.state().phase, ProgressPhase::Unregistered);
    tracker.parse("", Some(ProcessInfo { pid: 1 }));
    assert_eq!(tracker.parse(early, None).percent, 30);
}
