//! Environment instances stepped in parallel by worker threads.
use super::{stack_frames, step_with_reset};
use crate::{error::A2cError, record::Record, Env, Step, VecEnv, VecStep};
use anyhow::Result;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, info, warn};
use ndarray::Array2;
use std::{marker::PhantomData, thread::JoinHandle};

enum Request {
    Reset,
    Step(usize),
    Close,
}

enum Response {
    Spec {
        frame_shape: Vec<usize>,
        n_actions: usize,
    },
    Reset(Vec<f32>),
    Step(Step, Record),
}

fn worker_failed(rank: usize, reason: impl Into<String>) -> anyhow::Error {
    A2cError::WorkerFailed {
        rank,
        reason: reason.into(),
    }
    .into()
}

struct Worker {
    requests: Sender<Request>,
    responses: Receiver<Result<Response, String>>,
    handle: Option<JoinHandle<()>>,
}

/// Runs one environment instance per worker thread.
///
/// The instance of worker `rank` is built with seed `seed + rank`.
/// A request is sent to every worker and then the responses of all workers are
/// awaited, so each batched call is a synchronization barrier and no worker ever
/// has more than one outstanding request.
///
/// A failure of any worker is fatal: the error is returned as
/// [`A2cError::WorkerFailed`] and the pool is not usable anymore.
pub struct SubprocVecEnv<E: Env> {
    workers: Vec<Worker>,
    frame_shape: Vec<usize>,
    n_actions: usize,
    phantom: PhantomData<E>,
}

impl<E> SubprocVecEnv<E>
where
    E: Env + 'static,
    E::Config: Send + 'static,
{
    /// Spawns `n_procs` workers and waits until all environments are built.
    pub fn build(config: &E::Config, n_procs: usize, seed: i64) -> Result<Self> {
        if n_procs == 0 {
            return Err(A2cError::InvalidConfig("n_procs must be positive".to_string()).into());
        }

        let workers = (0..n_procs)
            .map(|rank| {
                let (req_s, req_r) = bounded(1);
                let (res_s, res_r) = unbounded();
                let config = config.clone();
                let seed = seed + rank as i64;
                let handle = std::thread::Builder::new()
                    .name(format!("env-worker-{}", rank))
                    .spawn(move || Self::run_worker(rank, config, seed, req_r, res_s))?;
                Ok(Worker {
                    requests: req_s,
                    responses: res_r,
                    handle: Some(handle),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut env = Self {
            workers,
            frame_shape: vec![],
            n_actions: 0,
            phantom: PhantomData,
        };

        // Handshake, each worker reports the spaces of its environment
        let specs = env.receive_all()?;
        for (rank, spec) in specs.into_iter().enumerate() {
            match spec {
                Response::Spec {
                    frame_shape,
                    n_actions,
                } => {
                    if rank == 0 {
                        env.frame_shape = frame_shape;
                        env.n_actions = n_actions;
                    } else if frame_shape != env.frame_shape || n_actions != env.n_actions {
                        return Err(worker_failed(
                            rank,
                            "inconsistent observation or action space",
                        ));
                    }
                }
                _ => return Err(worker_failed(rank, "unexpected response")),
            }
        }
        info!("Started {} environment workers", n_procs);

        Ok(env)
    }

    fn run_worker(
        rank: usize,
        config: E::Config,
        seed: i64,
        requests: Receiver<Request>,
        responses: Sender<Result<Response, String>>,
    ) {
        let mut env = match E::build(&config, seed) {
            Ok(env) => env,
            Err(e) => {
                let _ = responses.send(Err(format!("{:#}", e)));
                return;
            }
        };
        let spec = Response::Spec {
            frame_shape: env.frame_shape(),
            n_actions: env.n_actions(),
        };
        if responses.send(Ok(spec)).is_err() {
            return;
        }

        for request in requests.iter() {
            let response = match request {
                Request::Reset => env.reset().map(Response::Reset),
                Request::Step(act) => {
                    step_with_reset(&mut env, act).map(|(step, record)| Response::Step(step, record))
                }
                Request::Close => break,
            };
            let failed = response.is_err();
            if responses
                .send(response.map_err(|e| format!("{:#}", e)))
                .is_err()
                || failed
            {
                break;
            }
        }
        debug!("Environment worker {} stopped", rank);
    }

    fn send(&self, rank: usize, request: Request) -> Result<()> {
        self.workers[rank]
            .requests
            .send(request)
            .map_err(|_| worker_failed(rank, "disconnected"))
    }

    fn receive_all(&self) -> Result<Vec<Response>> {
        self.workers
            .iter()
            .enumerate()
            .map(|(rank, w)| match w.responses.recv() {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(reason)) => Err(worker_failed(rank, reason)),
                Err(_) => Err(worker_failed(rank, "disconnected")),
            })
            .collect()
    }
}

impl<E> VecEnv for SubprocVecEnv<E>
where
    E: Env + 'static,
    E::Config: Send + 'static,
{
    fn n_envs(&self) -> usize {
        self.workers.len()
    }

    fn frame_shape(&self) -> &[usize] {
        &self.frame_shape
    }

    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn reset(&mut self) -> Result<Array2<f32>> {
        for rank in 0..self.workers.len() {
            self.send(rank, Request::Reset)?;
        }
        let frames = self
            .receive_all()?
            .into_iter()
            .enumerate()
            .map(|(rank, response)| match response {
                Response::Reset(obs) => Ok(obs),
                _ => Err(worker_failed(rank, "unexpected response")),
            })
            .collect::<Result<Vec<_>>>()?;
        stack_frames(frames, self.frame_len())
    }

    fn step(&mut self, acts: &[usize]) -> Result<VecStep> {
        if acts.len() != self.workers.len() {
            return Err(A2cError::ShapeMismatch(format!(
                "{} actions for {} environments",
                acts.len(),
                self.workers.len()
            ))
            .into());
        }
        for (rank, &act) in acts.iter().enumerate() {
            self.send(rank, Request::Step(act))?;
        }

        let n = self.workers.len();
        let (mut frames, mut reward, mut is_done, mut info) = (
            Vec::with_capacity(n),
            Vec::with_capacity(n),
            Vec::with_capacity(n),
            Vec::with_capacity(n),
        );
        for (rank, response) in self.receive_all()?.into_iter().enumerate() {
            match response {
                Response::Step(step, record) => {
                    frames.push(step.obs);
                    reward.push(step.reward);
                    is_done.push(step.is_done);
                    info.push(record);
                }
                _ => return Err(worker_failed(rank, "unexpected response")),
            }
        }

        Ok(VecStep {
            obs: stack_frames(frames, self.frame_len())?,
            reward,
            is_done,
            info,
        })
    }
}

impl<E: Env> Drop for SubprocVecEnv<E> {
    fn drop(&mut self) {
        for w in self.workers.iter() {
            let _ = w.requests.send(Request::Close);
        }
        for (rank, w) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = w.handle.take() {
                if handle.join().is_err() {
                    warn!("Environment worker {} panicked", rank);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::{ScriptedEnv, ScriptedEnvConfig};

    fn config() -> ScriptedEnvConfig {
        ScriptedEnvConfig::new(vec![2])
            .rewards(vec![vec![1.0, 2.0], vec![3.0]])
            .dones(vec![vec![false, true], vec![false]])
    }

    #[test]
    fn test_step_and_auto_reset() -> Result<()> {
        let mut env = SubprocVecEnv::<ScriptedEnv>::build(&config(), 2, 0)?;
        assert_eq!(env.n_envs(), 2);
        assert_eq!(env.frame_shape(), &[2]);

        let obs = env.reset()?;
        assert_eq!(obs.row(0).to_vec(), vec![-1.0, -1.0]);

        let step = env.step(&[0, 0])?;
        assert_eq!(step.reward, vec![1.0, 3.0]);
        assert_eq!(step.is_done, vec![false, false]);
        assert_eq!(step.obs.row(1).to_vec(), vec![1.0, 1.0]);

        let step = env.step(&[0, 0])?;
        assert_eq!(step.reward, vec![2.0, 3.0]);
        assert_eq!(step.is_done, vec![true, false]);

        // The first instance was reset by its worker
        assert_eq!(step.obs.row(0).to_vec(), vec![-1.0, -1.0]);
        assert_eq!(step.obs.row(1).to_vec(), vec![2.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_worker_failure_is_fatal() -> Result<()> {
        let mut env = SubprocVecEnv::<ScriptedEnv>::build(&config().fail_at(Some(1)), 2, 0)?;
        env.reset()?;
        env.step(&[0, 0])?;
        let err = env.step(&[0, 0]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<A2cError>(),
            Some(A2cError::WorkerFailed { rank: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_wrong_number_of_actions() -> Result<()> {
        let mut env = SubprocVecEnv::<ScriptedEnv>::build(&config(), 2, 0)?;
        env.reset()?;
        assert!(env.step(&[0]).is_err());
        Ok(())
    }
}
